use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use crimebot::prelude::*;
use crimebot::{assistant, logging, offense, refresh};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Ask questions about Cincinnati calls-for-service data
#[derive(Parser, Debug)]
#[command(name = "crimebot")]
#[command(about = "Ask about recent crime incidents by neighborhood, offense type, or time")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

/// Options shared by every command that reads configuration
#[derive(ClapArgs, Debug, Clone)]
struct Common {
    /// Directory holding the stored table (default: ./data, or CRIMEBOT_DATA_DIR env var)
    #[arg(long = "data-dir")]
    data_dir: Option<PathBuf>,

    /// Config file (default: CRIMEBOT_CONFIG env var, then ./crimebot.yml if present)
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Options for commands that answer questions
#[derive(ClapArgs, Debug, Clone)]
struct AskOptions {
    #[command(flatten)]
    common: Common,

    /// Download the published table instead of reading the local file
    #[arg(long = "from-hub")]
    from_hub: bool,

    /// Text model on the Inference API (default: google/flan-t5-small, or CRIMEBOT_MODEL env var)
    #[arg(long)]
    model: Option<String>,

    /// Maximum tokens the model may generate per answer
    #[arg(long = "max-new-tokens")]
    max_new_tokens: Option<usize>,

    /// Also print the matching incidents as JSON lines
    #[arg(long = "show-rows")]
    show_rows: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer one question and exit
    Ask {
        /// The question, e.g. "how many thefts in Westwood last week?"
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        #[command(flatten)]
        options: AskOptions,
    },

    /// Read questions from stdin until EOF; `:reload` re-reads the table, `:quit` exits
    Chat {
        #[command(flatten)]
        options: AskOptions,
    },

    /// Fetch the full dataset, save it, and publish it to the dataset repository
    Refresh {
        #[command(flatten)]
        common: Common,

        /// Save the table as fetched, without column projection or cleanup
        #[arg(long)]
        raw: bool,

        /// Save locally only
        #[arg(long = "skip-upload")]
        skip_upload: bool,
    },

    /// List the offense groups a question can mention
    Groups,
}

fn print_available_commands() {
    println!("Available commands:");
    println!("  ask      Answer one question and exit");
    println!("  chat     Answer questions read from stdin");
    println!("  refresh  Fetch, save and publish the latest dataset");
    println!("  groups   List the offense groups a question can mention");
}

/// Defaults, then config file, then environment, then flags
fn base_builder(common: &Common) -> anyhow::Result<ConfigBuilder> {
    let mut builder = ConfigBuilder::new();
    if let Some(file) = FileConfig::discover(common.config.as_deref())
        .context("Failed to read config file")?
    {
        builder = builder.file(file);
    }
    builder = builder.env();
    if let Some(dir) = &common.data_dir {
        builder = builder.data_dir(dir);
    }
    Ok(builder)
}

fn ask_config(options: &AskOptions) -> anyhow::Result<Config> {
    let mut builder = base_builder(&options.common)?;
    if options.from_hub {
        builder = builder.table_source(TableSource::Hub);
    }
    if let Some(model) = &options.model {
        builder = builder.model(model);
    }
    if let Some(tokens) = options.max_new_tokens {
        builder = builder.max_new_tokens(tokens);
    }
    Ok(builder.build()?)
}

fn print_reply(reply: &Reply, show_rows: bool) -> anyhow::Result<()> {
    println!("{}", reply.text);
    if show_rows {
        for row in &reply.rows {
            println!("{}", serde_json::to_string(row)?);
        }
    }
    Ok(())
}

fn run_ask_command(question: Vec<String>, options: AskOptions) -> anyhow::Result<()> {
    let config = ask_config(&options)?;
    let mut bot = assistant::from_config(&config);

    let question = question.join(" ");
    let reply = bot
        .ask(&question)
        .with_context(|| format!("Failed to answer: {}", question))?;
    print_reply(&reply, options.show_rows)
}

fn run_chat_command(options: AskOptions) -> anyhow::Result<()> {
    let config = ask_config(&options)?;
    let mut bot = assistant::from_config(&config);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("Ask a question: ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line?;
        let question = line.trim();

        match question {
            "" => continue,
            ":quit" | ":q" => break,
            ":reload" => match bot.reload() {
                Ok(rows) => println!("Reloaded {} incidents.", rows),
                Err(e) => eprintln!("Error: {}", e),
            },
            _ => match bot.ask(question) {
                Ok(reply) => print_reply(&reply, options.show_rows)?,
                // Keep the session alive; the next question may work
                Err(e) => eprintln!("Error: {}", e),
            },
        }
    }
    Ok(())
}

fn run_refresh_command(common: Common, raw: bool, skip_upload: bool) -> anyhow::Result<()> {
    let mut builder = base_builder(&common)?;
    if raw {
        builder = builder.raw();
    }
    if skip_upload {
        builder = builder.skip_upload();
    }
    let config = builder.build()?;

    let report = refresh::run(&config).context("Refresh failed")?;
    println!(
        "Saved {} records to {} (sha256 {})",
        report.records,
        report.path.display(),
        report.digest
    );
    Ok(())
}

fn run_groups_command() {
    for group in offense::OFFENSE_GROUPS {
        println!("{}", group.name);
        for code in group.codes {
            println!("  {}", code);
        }
    }
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init();

    let args = Args::parse();

    match args.command {
        Some(Command::Ask { question, options }) => run_ask_command(question, options),
        Some(Command::Chat { options }) => run_chat_command(options),
        Some(Command::Refresh {
            common,
            raw,
            skip_upload,
        }) => run_refresh_command(common, raw, skip_upload),
        Some(Command::Groups) => {
            run_groups_command();
            Ok(())
        }
        None => {
            print_available_commands();
            Ok(())
        }
    }
}
