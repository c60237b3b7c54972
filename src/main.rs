use clap::Parser;
use tracing_subscriber::EnvFilter;

use papergraph::{
    cli::{Cli, Command, IngestArgs, ProjectArgs},
    data_dir::DataDir,
    embedder::{Embedder, HashingEmbedder},
    error::{Error, Result},
    extractor::{DocumentExtractor, PdfExtractor, PlainTextExtractor},
    graph::{EdgeKind, GraphStore},
    identity::{EntityKind, PaperId},
    keywords::TermFrequencyExtractor,
    pipeline::{self, FileStatus, PipelineContext},
    projection,
    query::{self, PaperHit, ScoredHit, SemanticQuery},
};

fn init_tracing(verbose: u8) {
    let filter = if let Ok(env) = std::env::var("PAPERGRAPH_LOG") {
        EnvFilter::new(env)
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let store = GraphStore::open(&data_dir.graph_db())?;
    let embedder = build_embedder(&cli)?;

    match &cli.command {
        Command::Ingest(args) => cmd_ingest(&store, embedder.as_ref(), args),
        Command::Search(args) => {
            let hits =
                query::exact_search(&store, args.field.into(), &args.term)?;
            if args.json {
                print_exact_json(&hits);
            } else {
                print_exact_human(&store, &hits)?;
            }
            Ok(())
        }
        Command::Ssearch(args) => {
            let mut q = SemanticQuery::new(args.query.clone());
            q.limit = args.count;
            q.min_score = args.min_score;

            let hits = query::semantic_search(&store, embedder.as_ref(), &q)?;
            if args.json {
                print_semantic_json(&hits, &args.query);
            } else {
                print_semantic_human(&hits);
            }
            Ok(())
        }
        Command::List(args) => cmd_list(&store, args.json),
        Command::Project(args) => {
            cmd_project(&store, embedder.as_ref(), args)
        }
        Command::Status(args) => cmd_status(&store, args.json),
        Command::Completions(_) => unreachable!("handled above"),
    }
}

fn build_embedder(cli: &Cli) -> Result<Box<dyn Embedder>> {
    if cli.offline_embedder {
        return Ok(Box::new(HashingEmbedder::default()));
    }

    #[cfg(feature = "fastembed")]
    {
        use papergraph::embedder::FastEmbedder;

        let embedder = match &cli.model {
            Some(name) => {
                FastEmbedder::with_model(FastEmbedder::parse_model(name)?)
            }
            None => FastEmbedder::new(),
        };
        return Ok(Box::new(embedder));
    }

    #[cfg(not(feature = "fastembed"))]
    {
        Err(Error::Config(
            "built without the fastembed feature; pass --offline-embedder"
                .into(),
        ))
    }
}

fn cmd_ingest(
    store: &GraphStore,
    embedder: &dyn Embedder,
    args: &IngestArgs,
) -> Result<()> {
    if !args.dir.is_dir() {
        return Err(Error::Config(format!(
            "not a directory: {}",
            args.dir.display()
        )));
    }

    let extractor: Box<dyn DocumentExtractor> = if args.plain_text {
        Box::new(PlainTextExtractor)
    } else {
        Box::new(PdfExtractor)
    };
    let keywords = TermFrequencyExtractor;

    let mut ctx = PipelineContext::new(extractor.as_ref(), &keywords, embedder);
    ctx.max_keywords = args.keywords;

    let report = pipeline::ingest_directory(store, &ctx, &args.dir)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
        return Ok(());
    }

    println!(
        "Ingested {}, skipped {} duplicate(s), {} failed.",
        report.ingested, report.duplicates, report.failed
    );
    for outcome in &report.outcomes {
        if outcome.status == FileStatus::Failed {
            println!(
                "  failed  {}: {}",
                outcome.path.display(),
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    for collision in &report.collisions {
        println!(
            "  warning {}: title '{}' already held by {}",
            collision.path.display(),
            collision.title,
            collision.existing
        );
    }
    Ok(())
}

fn print_exact_human(store: &GraphStore, hits: &[PaperHit]) -> Result<()> {
    if hits.is_empty() {
        println!("No papers found.");
        return Ok(());
    }

    for hit in hits {
        let authors = author_line(store, hit)?;
        println!("{} {}", hit.id, hit.record.title);
        println!(
            "     {}  {}  {}",
            if authors.is_empty() { "--" } else { authors.as_str() },
            hit.record
                .year
                .map(|y| y.to_string())
                .unwrap_or_else(|| "--".into()),
            hit.record.doi.as_deref().unwrap_or("--"),
        );
    }
    println!("\n{} result(s)", hits.len());
    Ok(())
}

fn author_line(store: &GraphStore, hit: &PaperHit) -> Result<String> {
    let mut names = Vec::new();
    for (key, _) in store.neighbors(&hit.id, EdgeKind::AuthoredBy)? {
        let display = store
            .get_entity(EntityKind::Author, &key)?
            .map(|e| e.display)
            .unwrap_or(key);
        names.push(display);
    }
    Ok(names.join(", "))
}

fn print_exact_json(hits: &[PaperHit]) {
    let value: Vec<serde_json::Value> = hits
        .iter()
        .map(|hit| {
            serde_json::json!({
                "id": hit.id.as_hex(),
                "title": hit.record.title,
                "file": hit.record.file_name,
                "year": hit.record.year,
                "doi": hit.record.doi,
            })
        })
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&value).unwrap_or_default()
    );
}

fn print_semantic_human(hits: &[ScoredHit]) {
    if hits.is_empty() {
        println!("No papers found.");
        return;
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{:>3}. [{:.4}] {} {}",
            i + 1,
            hit.score,
            hit.id,
            hit.record.title
        );
    }
    println!("\n{} result(s)", hits.len());
}

fn print_semantic_json(hits: &[ScoredHit], query_text: &str) {
    let value = serde_json::json!({
        "query": query_text,
        "result_count": hits.len(),
        "results": hits.iter().enumerate().map(|(i, hit)| {
            serde_json::json!({
                "rank": i + 1,
                "score": hit.score,
                "id": hit.id.as_hex(),
                "title": hit.record.title,
            })
        }).collect::<Vec<_>>(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&value).unwrap_or_default()
    );
}

fn cmd_list(store: &GraphStore, json: bool) -> Result<()> {
    let mut papers = store.list_papers()?;
    papers.sort_by(|a, b| {
        a.1.title_key.cmp(&b.1.title_key).then_with(|| a.0.cmp(&b.0))
    });

    if json {
        let value: Vec<serde_json::Value> = papers
            .iter()
            .map(|(id, record)| {
                serde_json::json!({
                    "id": id.as_hex(),
                    "title": record.title,
                    "file": record.file_name,
                    "year": record.year,
                    "doi": record.doi,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&value).unwrap_or_default()
        );
        return Ok(());
    }

    if papers.is_empty() {
        println!("No papers in the store.");
        return Ok(());
    }

    println!("=== {} paper(s) in the store ===", papers.len());
    for (id, record) in &papers {
        println!("{} {}", id, record.title);
    }
    Ok(())
}

fn cmd_project(
    store: &GraphStore,
    embedder: &dyn Embedder,
    args: &ProjectArgs,
) -> Result<()> {
    let ids: Vec<PaperId> = if let Some(text) = &args.query {
        let mut q = SemanticQuery::new(text.clone());
        q.limit = args.count;
        query::semantic_search(store, embedder, &q)?
            .into_iter()
            .map(|hit| hit.id)
            .collect()
    } else if let (Some(field), Some(term)) = (&args.field, &args.term) {
        query::exact_search(store, (*field).into(), term)?
            .into_iter()
            .map(|hit| hit.id)
            .collect()
    } else {
        return Err(Error::InvalidQuery(
            "provide either --query or --field/--term".into(),
        ));
    };

    let graph = projection::project(store, &ids)?;
    let json = graph.to_json()?;

    match &args.out {
        Some(path) => {
            std::fs::write(path, json)?;
            println!(
                "Wrote {} node(s), {} edge(s) to {}",
                graph.nodes.len(),
                graph.edges.len(),
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_status(store: &GraphStore, json: bool) -> Result<()> {
    let stats = store.stats()?;
    let config = store.embedding_config()?;

    if json {
        let value = serde_json::json!({
            "papers": stats.papers,
            "authors": stats.authors,
            "topics": stats.topics,
            "keywords": stats.keywords,
            "edges": stats.edges,
            "embedding_model": config.as_ref().map(|c| c.model_id.clone()),
            "embedding_dimension": config.as_ref().map(|c| c.dimension),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).unwrap_or_default()
        );
        return Ok(());
    }

    println!("papers:   {}", stats.papers);
    println!("authors:  {}", stats.authors);
    println!("topics:   {}", stats.topics);
    println!("keywords: {}", stats.keywords);
    println!("edges:    {}", stats.edges);
    match config {
        Some(config) => println!(
            "embedder: {} (dim {})",
            config.model_id, config.dimension
        ),
        None => println!("embedder: not configured (store is empty)"),
    }
    Ok(())
}
