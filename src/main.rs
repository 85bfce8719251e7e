use bagql::cli::{self, CliError, QueryOptions, QueryResult};
use clap::Parser as ClapParser;
use std::io::{self, Read};

#[derive(ClapParser)]
#[command(name = "bagql")]
#[command(about = "bagql - a SQL-derived query language for semi-structured data")]
#[command(version)]
struct Cli {
    /// The query to execute
    query: String,

    /// JSON input document (reads from stdin if not provided)
    #[arg(short, long)]
    input: Option<String>,

    /// Pretty-print the output
    #[arg(short, long)]
    pretty: bool,

    /// Only validate syntax, don't execute
    #[arg(long)]
    syntax_only: bool,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let input = match cli.input {
        Some(s) => Some(s),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(CliError::Io)?;
            Some(buffer)
        }
        None => None,
    };

    let options = QueryOptions {
        query: cli.query,
        input,
        pretty: cli.pretty,
        syntax_only: cli.syntax_only,
    };

    match cli::execute_query(&options)? {
        QueryResult::SyntaxValid => println!("Syntax is valid"),
        QueryResult::Success(output) => println!("{}", output),
    }
    Ok(())
}
