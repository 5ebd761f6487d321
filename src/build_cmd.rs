//! `docwiki build`, `docwiki status` and `docwiki ping`.

use anyhow::{bail, Context, Result};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::Config;
use crate::discover::find_docx_files;
use crate::extract::DocxReader;
use crate::index::ArticleIndex;
use crate::layout::KnowledgeBaseLayout;
use crate::llm::ChatExtractionService;
use crate::pipeline::Pipeline;
use crate::progress::ProgressMode;

/// Options of one `build` invocation.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub documents: Vec<PathBuf>,
    pub dir: Option<PathBuf>,
    pub recursive: bool,
    pub output: Option<PathBuf>,
    pub model: Option<String>,
    pub yes: bool,
    pub force: bool,
    /// 1-based document number to process without prompting.
    pub select: Option<usize>,
    pub progress: Option<ProgressMode>,
}

/// Answer to the directory-mode prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    All,
    None,
    Each,
    /// 0-based index into the listed documents.
    Single(usize),
}

/// Parse a prompt answer for a list of `count` documents.
pub fn parse_selection(input: &str, count: usize) -> Option<Selection> {
    let answer = input.trim().to_lowercase();
    match answer.as_str() {
        "y" | "yes" | "a" | "all" => Some(Selection::All),
        "n" | "no" | "none" => Some(Selection::None),
        "e" | "each" => Some(Selection::Each),
        _ => match answer.parse::<usize>() {
            Ok(n) if n >= 1 && n <= count => Some(Selection::Single(n - 1)),
            _ => None,
        },
    }
}

/// Interactive document selection over arbitrary input/output streams.
pub fn select_documents<R: BufRead, W: Write>(
    files: &[PathBuf],
    root: &Path,
    input: &mut R,
    out: &mut W,
) -> Result<Vec<PathBuf>> {
    writeln!(out, "Found {} document(s):", files.len())?;
    for (i, file) in files.iter().enumerate() {
        writeln!(out, "  {}. {}", i + 1, display_relative(file, root))?;
    }

    let selection = loop {
        write!(
            out,
            "Process documents? [y]es all / [n]o / [e]ach / number (1-{}): ",
            files.len()
        )?;
        out.flush()?;
        let Some(line) = read_line(input)? else {
            break Selection::None;
        };
        match parse_selection(&line, files.len()) {
            Some(selection) => break selection,
            None => writeln!(out, "Please answer y, n, e or a number.")?,
        }
    };

    Ok(match selection {
        Selection::All => files.to_vec(),
        Selection::None => Vec::new(),
        Selection::Single(i) => vec![files[i].clone()],
        Selection::Each => {
            let mut chosen = Vec::new();
            for file in files {
                write!(out, "Process {}? (y/n/q): ", display_relative(file, root))?;
                out.flush()?;
                let answer = read_line(input)?.unwrap_or_else(|| "q".to_string());
                match answer.trim().to_lowercase().as_str() {
                    "y" | "yes" => chosen.push(file.clone()),
                    "q" | "quit" => break,
                    _ => {}
                }
            }
            chosen
        }
    })
}

fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

/// Resolve which documents a build processes.
pub fn resolve_documents<R: BufRead, W: Write>(
    config: &Config,
    opts: &BuildOptions,
    input: &mut R,
    out: &mut W,
) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();
    for doc in &opts.documents {
        if !doc.is_file() {
            bail!("Document not found: {}", doc.display());
        }
        documents.push(doc.clone());
    }

    if let Some(dir) = &opts.dir {
        let found = find_docx_files(dir, opts.recursive, &config.scan.exclude_globs)?;
        if found.is_empty() {
            writeln!(out, "No .docx files found in {}", dir.display())?;
        } else if let Some(n) = opts.select {
            if n == 0 || n > found.len() {
                bail!("--select {} is out of range (1-{})", n, found.len());
            }
            documents.push(found[n - 1].clone());
        } else if opts.yes {
            documents.extend(found);
        } else {
            documents.extend(select_documents(&found, dir, input, out)?);
        }
    }
    Ok(documents)
}

pub async fn run_build(config: &Config, opts: BuildOptions) -> Result<()> {
    if opts.documents.is_empty() && opts.dir.is_none() {
        bail!("Nothing to build: pass document paths or --dir <DIR>");
    }

    let service = ChatExtractionService::new(config, opts.model.as_deref())
        .context("Cannot create extraction service")?;

    let stdin = std::io::stdin();
    let documents = resolve_documents(config, &opts, &mut stdin.lock(), &mut std::io::stdout())?;
    if documents.is_empty() {
        println!("build");
        println!("  no documents selected");
        return Ok(());
    }

    let output = opts.output.clone().unwrap_or_else(|| config.output.dir.clone());
    let reader = DocxReader;
    let reporter = opts.progress.unwrap_or_default();

    info!(
        documents = documents.len(),
        output = %output.display(),
        models = ?service.models(),
        "starting build"
    );

    let mut pipeline =
        Pipeline::new(&reader, &service, &output, &reporter).force(opts.force);
    let stats = pipeline.run(&documents).await?;

    println!("build {}", output.display());
    println!("  documents: {}", stats.documents);
    if stats.documents_failed > 0 {
        println!("  documents failed: {}", stats.documents_failed);
    }
    println!("  articles written: {}", stats.written);
    println!("  up to date: {}", stats.up_to_date);
    println!("  insufficient information: {}", stats.insufficient);
    if stats.empty > 0 {
        println!("  empty content: {}", stats.empty);
    }
    println!("  extraction failed: {}", stats.failed);
    if stats.documents_failed > 0 || stats.failed > 0 {
        println!("done with errors");
        bail!(
            "Build incomplete: {} document(s) failed, {} extraction(s) failed",
            stats.documents_failed,
            stats.failed
        );
    }
    println!("ok");
    Ok(())
}

pub fn run_status(config: &Config, output: Option<PathBuf>) -> Result<()> {
    let root = output.unwrap_or_else(|| config.output.dir.clone());
    let layout = KnowledgeBaseLayout::scan(&root)?;
    let index = ArticleIndex::load(layout.root());

    println!("knowledge base {}", layout.root().display());
    if layout.is_empty() {
        println!("  empty");
        return Ok(());
    }
    println!("  products: {}", layout.products().len());
    println!("  clients: {}", layout.clients().len());
    println!("  documents: {}", layout.documents().len());
    println!("  indexed articles: {}", index.len());
    println!();
    for article in layout.articles()? {
        println!(
            "  {}  {}",
            article.source_modified.as_deref().unwrap_or("-"),
            article.path
        );
    }
    Ok(())
}

pub async fn run_ping(config: &Config, model: Option<&str>) -> Result<()> {
    let service = ChatExtractionService::new(config, model)
        .context("Cannot create extraction service")?;
    let (fast, _) = service.models();
    println!("ping {} ({})", config.llm.base_url, fast);
    let reply = service.ping().await.context("Ping failed")?;
    println!("  reply: {}", reply.trim());
    println!("ok");
    Ok(())
}
