use std::{
    error::Error,
    io::{self, Write},
    net::{SocketAddr, TcpStream},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use clap::Parser;
use docwire::{
    Connection, Document, Namespace, Query,
    cli::{Command, prompt},
};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server address
    address: SocketAddr,
    /// Target collection as `database.collection`
    namespace: String,
    /// JSON filter
    #[arg(long, default_value = "{}")]
    filter: String,
    /// Comma separated fields to return
    #[arg(long, value_delimiter = ',')]
    fields: Vec<String>,
    /// JSON sort order, e.g. '{"age": -1}'
    #[arg(long)]
    sort: Option<String>,
    /// Documents to skip
    #[arg(long, default_value_t = 0)]
    skip: i32,
    /// Stop after this many documents
    #[arg(long)]
    take: Option<usize>,
    /// Read filters from standard input, one per line
    #[arg(short, long)]
    interactive: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize env_logger; For logging to STDOUT/STDERR
    env_logger::init();

    let cli = Cli::parse();
    let namespace = Namespace::parse(&cli.namespace)
        .ok_or_else(|| format!("'{}' is not a database.collection name", cli.namespace))?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))?;

    let mut connection = Connection::new(TcpStream::connect(cli.address)?);
    let mut base = Query::new(namespace, Document::new()).skip(cli.skip);
    if !cli.fields.is_empty() {
        base = base.select(cli.fields.iter().cloned());
    }
    if let Some(sort) = &cli.sort {
        base = base.sort(Document::parse_json(sort)?);
    }

    if !cli.interactive {
        let mut query = base;
        query.filter = Document::parse_json(&cli.filter)?;
        return run(&mut connection, query, cli.take, &interrupted);
    }

    let mut take = cli.take;
    let stdin = io::stdin();
    loop {
        let cmd = match prompt(stdin.lock(), io::stdout().lock()) {
            Ok(cmd) => cmd,
            Err(e) => {
                eprintln!("error: {e}");
                continue;
            }
        };

        match cmd {
            Command::Exit => break,
            Command::Take(n) => take = n,
            Command::Find(filter) => {
                let mut query = base.clone();
                query.filter = filter;
                interrupted.store(false, Ordering::SeqCst);
                if let Err(e) = run(&mut connection, query, take, &interrupted) {
                    eprintln!("query error: {e}");
                    if !connection.is_open() {
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Prints every result as a JSON line, closing the cursor early on Ctrl-C.
fn run(
    connection: &mut Connection<TcpStream>,
    query: Query,
    take: Option<usize>,
    interrupted: &AtomicBool,
) -> Result<(), Box<dyn Error>> {
    let mut stdout = io::stdout().lock();
    let mut stream = connection.stream(query, take);

    while let Some(batch) = stream.next_batch()? {
        for doc in batch {
            writeln!(stdout, "{}", doc.to_json())?;
        }
        if interrupted.load(Ordering::SeqCst) {
            eprintln!("interrupted after {} documents", stream.collected());
            return Ok(stream.close()?);
        }
    }
    stdout.flush()?;
    Ok(())
}
