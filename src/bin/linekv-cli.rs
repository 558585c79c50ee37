//! linekv CLI - a small client for the linekv line protocol
//!
//! With command arguments, sends them as one request and prints the reply.
//! Without, opens an interactive prompt that runs until EOF or `GOODBYE`.

use anyhow::{bail, Context};
use linekv::config::parse_port;
use linekv::protocol::quote;
use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;

const USAGE: &str = r#"
USAGE:
    linekv-cli [-h <HOST>] [-p <PORT>] [COMMAND [ARG ...]]

Host and port default to the HOST and PORT environment variables, then
127.0.0.1:8080.

EXAMPLES:
    linekv-cli SET greeting "hello world"
    linekv-cli -p 9000 HGET user:1 name
    linekv-cli                            # interactive mode
"#;

struct Config {
    host: String,
    port: u16,
}

impl Config {
    fn from_env() -> anyhow::Result<Self> {
        let host = std::env::var("HOST")
            .ok()
            .filter(|h| !h.is_empty() && h != "0.0.0.0")
            .unwrap_or_else(|| "127.0.0.1".to_string());
        let port = match std::env::var("PORT") {
            Ok(p) => parse_port(&p)?,
            Err(_) => linekv::DEFAULT_PORT,
        };
        Ok(Self { host, port })
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A parsed server reply.
struct Reply {
    is_error: bool,
    body: Vec<String>,
}

struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Connection {
    fn connect(config: &Config) -> anyhow::Result<Self> {
        let addr = config.address();
        let stream = TcpStream::connect(&addr)
            .with_context(|| format!("Could not connect to linekv at {}", addr))?;
        stream.set_nodelay(true).ok();

        let writer = stream.try_clone().context("failed to clone socket")?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
        })
    }

    fn execute(&mut self, request: &str) -> anyhow::Result<Reply> {
        self.writer
            .write_all(format!("{}\n", request).as_bytes())
            .context("write error")?;
        self.read_reply()
    }

    fn read_reply(&mut self) -> anyhow::Result<Reply> {
        let header = self.read_line()?;
        let kind = match header.strip_prefix("RESPONSE ") {
            Some(kind) => kind.to_string(),
            None => bail!("unexpected reply header: {:?}", header),
        };

        let mut body = Vec::new();
        loop {
            let line = self.read_line()?;
            if line == "END" {
                break;
            }
            body.push(line);
        }

        Ok(Reply {
            is_error: kind == "ERROR",
            body,
        })
    }

    fn read_line(&mut self) -> anyhow::Result<String> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).context("read error")? == 0 {
            bail!("connection closed by server");
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

fn print_reply(reply: &Reply) {
    for line in &reply.body {
        if reply.is_error {
            println!("(error) {}", line);
        } else {
            println!("{}", line);
        }
    }
}

fn is_goodbye(request: &str) -> bool {
    request.split_whitespace().next() == Some("GOODBYE")
}

fn run_interactive(config: &Config) -> anyhow::Result<()> {
    let mut conn = Connection::connect(config)?;
    let prompt = format!("{}> ", config.address());

    println!("Connected to linekv at {}", config.address());
    println!("Type GOODBYE or press Ctrl+D to exit.\n");

    let stdin = io::stdin();
    loop {
        print!("{}", prompt);
        io::stdout().flush().ok();

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            println!();
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let reply = conn.execute(input)?;
        print_reply(&reply);

        if is_goodbye(input) && !reply.is_error {
            break;
        }
    }

    Ok(())
}

fn run_once(config: &Config, args: &[String]) -> anyhow::Result<bool> {
    let request = args
        .iter()
        .map(|arg| quote(arg))
        .collect::<Vec<_>>()
        .join(" ");

    let mut conn = Connection::connect(config)?;
    let reply = conn.execute(&request)?;
    print_reply(&reply);
    Ok(!reply.is_error)
}

fn main() {
    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut args = std::env::args().skip(1);
    let mut command: Vec<String> = Vec::new();

    while let Some(arg) = args.next() {
        if !command.is_empty() {
            command.push(arg);
            continue;
        }
        match arg.as_str() {
            "-h" | "--host" => match args.next() {
                Some(host) => config.host = host,
                None => {
                    eprintln!("Error: {} requires a value\n{}", arg, USAGE);
                    std::process::exit(1);
                }
            },
            "-p" | "--port" => match args.next().as_deref().map(parse_port) {
                Some(Ok(port)) => config.port = port,
                Some(Err(e)) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
                None => {
                    eprintln!("Error: {} requires a value\n{}", arg, USAGE);
                    std::process::exit(1);
                }
            },
            "--help" => {
                println!("{}", USAGE);
                return;
            }
            _ => command.push(arg),
        }
    }

    let result = if command.is_empty() {
        run_interactive(&config).map(|_| true)
    } else {
        run_once(&config, &command)
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
