//! rubrica - Compare rubrics across TEI manuscript witnesses

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use rubrica::rubric::{OrderSequence, verse_positions};
use rubrica::{Document, RenderOptions, Report, read_tei, write_html};

#[derive(Parser)]
#[command(name = "rubrica")]
#[command(version, about = "Compare rubrics across TEI manuscript witnesses", long_about = None)]
#[command(after_help = "EXAMPLES:
    rubrica by-date A.xml B.xml                          Table by liturgical date
    rubrica by-verse A.xml B.xml --verse-list verses.txt Table by verse
    rubrica positions A.xml --verse-list verses.txt      Verse positions as JSON")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Only report warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Group rubrics by the dates defined in the first document
    ByDate {
        #[command(flatten)]
        table: TableArgs,

        /// Output file path
        #[arg(short, long, default_value = "report-by-date.html")]
        output: PathBuf,
    },

    /// Group rubrics by verse in verse-list order
    ByVerse {
        #[command(flatten)]
        table: TableArgs,

        /// File with one verse reference per line
        #[arg(long, value_name = "FILE")]
        verse_list: PathBuf,

        /// Output file path
        #[arg(short, long, default_value = "report-by-verse.html")]
        output: PathBuf,
    },

    /// Print (document, verse) index pairs for every rubric as JSON
    Positions {
        /// TEI documents
        #[arg(value_name = "PATHS", required = true)]
        paths: Vec<PathBuf>,

        /// File with one verse reference per line
        #[arg(long, value_name = "FILE")]
        verse_list: PathBuf,
    },
}

#[derive(Args)]
struct TableArgs {
    /// TEI documents, one per witness
    #[arg(value_name = "PATHS", required = true)]
    paths: Vec<PathBuf>,

    /// Place to filter by (matched against placeName/@ref)
    #[arg(long, default_value = "")]
    place: String,

    /// Leave out facsimile links
    #[arg(long)]
    no_facs: bool,

    /// Page title
    #[arg(long, default_value = "")]
    title: String,
}

#[derive(Serialize)]
struct Position {
    document: usize,
    verse: usize,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "rubrica=warn" } else { "rubrica=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::ByDate { table, output } => {
            let docs = load(&table.paths)?;
            let page = report(&docs, &table).by_date()?;
            write_html(&output, &page)?;
        }
        Command::ByVerse {
            table,
            verse_list,
            output,
        } => {
            let verses = OrderSequence::read_verse_list(&verse_list)?;
            let docs = load(&table.paths)?;
            let page = report(&docs, &table).by_verse(&verses)?;
            write_html(&output, &page)?;
        }
        Command::Positions { paths, verse_list } => {
            let verses = OrderSequence::read_verse_list(&verse_list)?;
            let docs = load(&paths)?;
            let positions: Vec<Position> = verse_positions(&docs, &verses)
                .into_iter()
                .map(|(document, verse)| Position { document, verse })
                .collect();
            println!("{}", serde_json::to_string_pretty(&positions)?);
        }
    }
    Ok(())
}

fn load(paths: &[PathBuf]) -> rubrica::Result<Vec<Document>> {
    paths.iter().map(read_tei).collect()
}

fn report<'a>(docs: &'a [Document], args: &TableArgs) -> Report<'a> {
    Report::new(docs)
        .with_place(args.place.as_str())
        .with_title(args.title.as_str())
        .with_render_options(RenderOptions::new().with_facs(!args.no_facs))
}
