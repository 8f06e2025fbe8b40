use std::process::ExitCode;

use clap::Parser;
use markup2rdf::{
    DefaultProfileLoader, ProfileLoader, RdfaReader, ReaderOptions, RDFA_1_1_PROFILE,
};

/// Fetch a document and print the RDFa statements it carries as Turtle.
/// Processor messages go to stderr, also as Turtle.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// URL or local file path of the document to read
    #[arg(value_name = "TARGET")]
    target: String,

    /// Base IRI, overriding the document URL
    #[arg(long, value_name = "IRI")]
    base: Option<String>,

    /// Abort on validation errors instead of recording them
    #[arg(long)]
    validate: bool,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let (content, mime, base) = if let Ok(url) = url::Url::parse(&args.target) {
        let client = reqwest::blocking::Client::new();
        let response = client.get(url.clone()).send()?.error_for_status()?;
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let base = args.base.clone().unwrap_or_else(|| url.to_string());
        (response.bytes()?.to_vec(), mime, Some(base))
    } else {
        (std::fs::read(&args.target)?, None, args.base.clone())
    };

    let mut options = ReaderOptions::default()
        .with_processor_graph(true)
        .with_validate(args.validate);
    if let Some(base) = base {
        options = options.with_base(oxiri::Iri::parse(base)?);
    }

    let mut reader = RdfaReader::from_bytes(&content, mime.as_deref(), options)?;
    let mut graph = oxrdf::Graph::new();
    reader.each_statement(|statement| {
        graph.insert(statement.as_ref());
    })?;

    {
        let serializer = oxttl::TurtleSerializer::new();
        let mut locked_err = std::io::stderr().lock();
        let mut writer = serializer.for_writer(&mut locked_err);
        for triple in reader.processor_graph().iter() {
            writer.serialize_triple(triple)?;
        }
        writer.finish()?;
    }

    // compact the output with the well-known prefixes
    let mut serializer = oxttl::TurtleSerializer::new();
    let profile = DefaultProfileLoader::default()
        .find_profile(&oxiri::Iri::parse(RDFA_1_1_PROFILE.to_string())?)?;
    for (prefix, iri) in &profile.prefixes {
        serializer = serializer.with_prefix(prefix, iri)?;
    }
    let mut locked_out = std::io::stdout().lock();
    let mut writer = serializer.for_writer(&mut locked_out);
    for triple in graph.iter() {
        writer.serialize_triple(triple)?;
    }
    writer.finish()?;

    Ok(ExitCode::SUCCESS)
}
