//! CLI entry point for `mimemail`.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand};

use mimemail::config::{self, Config};
use mimemail::crypt::{self, WriteClose};
use mimemail::mime::multipart::is_valid_boundary;
use mimemail::model::address::{AddressRole, Mailbox};
use mimemail::transport::{self, SmtpTransport};
use mimemail::{Message, Recipient, Signer};

#[derive(Parser)]
#[command(
    name = "mimemail",
    version,
    about = "Compose MIME email, seal it in PGP/MIME and send it over SMTP"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a message (encrypted with --encrypt-to) to a file or stdout
    Compose {
        #[command(flatten)]
        message: MessageArgs,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compose a message and deliver it through the configured account
    Send {
        #[command(flatten)]
        message: MessageArgs,
    },
    /// Produce an armored signed message from a file or stdin
    Sign {
        /// Input file, `-` or omitted for stdin
        input: Option<PathBuf>,
        /// ASCII-armored private key
        #[arg(long, value_name = "KEY")]
        key: PathBuf,
        /// Passphrase for the key
        #[arg(long, env = "MIMEMAIL_PASSPHRASE", hide_env_values = true)]
        passphrase: Option<String>,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the config and log file locations
    Path,
}

#[derive(Args)]
struct MessageArgs {
    /// Account from the config file
    #[arg(short, long)]
    account: Option<String>,
    /// From address (default: the account's)
    #[arg(long)]
    from: Vec<String>,
    /// Sender address, when different from From
    #[arg(long)]
    sender: Option<String>,
    #[arg(long)]
    to: Vec<String>,
    #[arg(long)]
    cc: Vec<String>,
    #[arg(long)]
    bcc: Vec<String>,
    #[arg(long)]
    reply_to: Vec<String>,
    #[arg(short, long, default_value = "")]
    subject: String,
    /// Plain text body file, `-` for stdin
    #[arg(long, value_name = "FILE")]
    text: Option<PathBuf>,
    /// HTML body file
    #[arg(long, value_name = "FILE")]
    html: Option<PathBuf>,
    /// Files to attach
    #[arg(long, value_name = "FILE")]
    attach: Vec<PathBuf>,
    /// Fixed multipart boundary (default: random)
    #[arg(long, value_parser = parse_boundary)]
    boundary: Option<String>,
    /// Encrypt to this ASCII-armored public key
    #[arg(long, value_name = "KEY")]
    encrypt_to: Option<PathBuf>,
    /// Sign with this ASCII-armored private key
    #[arg(long, value_name = "KEY")]
    sign_with: Option<PathBuf>,
    /// Sign with the account's configured key
    #[arg(long, conflicts_with = "sign_with")]
    sign: bool,
    /// Passphrase for --sign-with
    #[arg(long, env = "MIMEMAIL_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,
}

fn parse_boundary(s: &str) -> Result<String, String> {
    if is_valid_boundary(s) {
        Ok(s.to_string())
    } else {
        Err("boundary must be 1-70 characters from the RFC 2046 set".to_string())
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Compose { message, output } => cmd_compose(&config, &message, output.as_deref()),
        Commands::Send { message } => cmd_send(&config, &message),
        Commands::Sign {
            input,
            key,
            passphrase,
            output,
        } => cmd_sign(
            &config,
            input.as_deref(),
            &key,
            passphrase.as_deref().unwrap_or(""),
            output.as_deref(),
        ),
        Commands::Config { action } => cmd_config(&config, action),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_path = config::log_file_path(config);
    let target = match (log_path.parent(), log_path.file_name()) {
        (Some(dir), Some(name)) if std::fs::create_dir_all(dir).is_ok() => Some((dir, name)),
        _ => None,
    };
    if let Some((log_dir, log_name)) = target {
        let file_appender = tracing_appender::rolling::never(log_dir, log_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Create or locate the config file.
fn cmd_config(config: &Config, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init { force } => {
            let path = config::config_file_path()
                .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
            let path = config::save_config(&Config::default())?;
            eprintln!("Wrote {}", path.display());
        }
        ConfigAction::Path => {
            match config::config_file_path() {
                Some(path) => println!("config: {}", path.display()),
                None => println!("config: <none>"),
            }
            println!("log:    {}", config::log_file_path(config).display());
        }
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mimemail", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::stdout().write_all(&buf)?;
    Ok(())
}

/// Build the message and write it, encrypted when asked to.
fn cmd_compose(config: &Config, args: &MessageArgs, output: Option<&Path>) -> anyhow::Result<()> {
    let message = build_message(config, args)?;
    let recipient = load_recipient(args)?;
    let signer = load_signer(config, args)?;

    let bytes = match recipient {
        Some(ref recipient) => message.encrypt(recipient, signer.as_ref(), &config.pgp)?,
        None => {
            if signer.is_some() {
                anyhow::bail!("signing a message requires --encrypt-to");
            }
            message.to_bytes()?
        }
    };
    write_output(output, &bytes)
}

/// Build the message and deliver it with the account's SMTP server.
fn cmd_send(config: &Config, args: &MessageArgs) -> anyhow::Result<()> {
    let account = config.account(args.account.as_deref())?;
    let message = build_message(config, args)?;
    let recipient = load_recipient(args)?;
    let signer = load_signer(config, args)?;

    let smtp = SmtpTransport::from_account(account)?;
    match recipient {
        Some(ref recipient) => {
            transport::send_encrypted(&smtp, &message, recipient, signer.as_ref(), &config.pgp)?
        }
        None => {
            if signer.is_some() {
                anyhow::bail!("signing a message requires --encrypt-to");
            }
            transport::send_message(&smtp, &message)?
        }
    }
    eprintln!("Sent to {} recipient(s)", message.recipients().len());
    Ok(())
}

/// Sign stdin or a file into an armored OpenPGP message.
fn cmd_sign(
    config: &Config,
    input: Option<&Path>,
    key: &Path,
    passphrase: &str,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let data = read_input(input)?;
    let signer = crypt::prepare_signer(&read_key(key)?, passphrase)?;

    let mut armored = Vec::new();
    let mut w = crypt::open_sign_writer(&mut armored, &signer, &config.pgp)?;
    w.write_all(&data)?;
    w.close()?;
    drop(w);
    write_output(output, &armored)
}

fn build_message(config: &Config, args: &MessageArgs) -> anyhow::Result<Message> {
    let mut message = Message::new();

    let account = match args.account {
        Some(ref name) => Some(config.account(Some(name))?),
        None => config.account(None).ok(),
    };
    if args.from.is_empty() {
        if let Some(account) = account {
            message.add_address(AddressRole::From, account.mailbox());
        }
    }

    let roles: [(AddressRole, &[String]); 5] = [
        (AddressRole::From, args.from.as_slice()),
        (AddressRole::To, args.to.as_slice()),
        (AddressRole::Cc, args.cc.as_slice()),
        (AddressRole::Bcc, args.bcc.as_slice()),
        (AddressRole::ReplyTo, args.reply_to.as_slice()),
    ];
    for (role, values) in roles {
        for raw in values {
            for mailbox in Mailbox::parse_list(raw) {
                message.add_address(role, mailbox);
            }
        }
    }
    if let Some(ref sender) = args.sender {
        message.add_address(AddressRole::Sender, Mailbox::parse(sender));
    }

    message.set_subject(args.subject.clone());
    if let Some(ref path) = args.text {
        let body = read_input(Some(path))?;
        message.plain_text_body().write_all(&body)?;
    }
    if let Some(ref path) = args.html {
        let body = std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
        message.html_body().write_all(&body)?;
    }
    for path in &args.attach {
        message.add_file(path, None)?;
    }
    if let Some(ref boundary) = args.boundary {
        message.pin_boundary(boundary.clone())?;
    }

    message.effective_sender()?;
    if message.recipients().is_empty() {
        anyhow::bail!("no recipients: give at least one of --to, --cc or --bcc");
    }
    Ok(message)
}

fn load_recipient(args: &MessageArgs) -> anyhow::Result<Option<Recipient>> {
    match args.encrypt_to {
        Some(ref path) => Ok(Some(crypt::prepare_recipient(&read_key(path)?)?)),
        None => Ok(None),
    }
}

fn load_signer(config: &Config, args: &MessageArgs) -> anyhow::Result<Option<Signer>> {
    if let Some(ref path) = args.sign_with {
        let passphrase = args.passphrase.as_deref().unwrap_or("");
        return Ok(Some(crypt::prepare_signer(&read_key(path)?, passphrase)?));
    }
    if args.sign {
        let account = config.account(args.account.as_deref())?;
        return match account.signer()? {
            Some(signer) => Ok(Some(signer)),
            None => anyhow::bail!("account '{}' has no key configured", account.address),
        };
    }
    Ok(None)
}

fn read_key(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))
}

fn read_input(path: Option<&Path>) -> anyhow::Result<Vec<u8>> {
    let mut data = Vec::new();
    match path {
        Some(p) if p != Path::new("-") => {
            data = std::fs::read(p).map_err(|e| anyhow::anyhow!("{}: {e}", p.display()))?;
        }
        _ => {
            std::io::stdin().read_to_end(&mut data)?;
        }
    }
    Ok(data)
}

fn write_output(output: Option<&Path>, bytes: &[u8]) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, bytes).map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
            eprintln!("Wrote {} bytes to {}", bytes.len(), path.display());
        }
        None => std::io::stdout().write_all(bytes)?,
    }
    Ok(())
}
