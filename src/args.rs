use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "digest-press")]
#[command(about = "Publishes a page tree as HTML pages and mailable digests")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render pages and digests from the crawl cache, optionally refreshing it first
    Publish(PublishArgs),
    /// Send a rendered digest
    Mail(MailArgs),
}

#[derive(ClapArgs, Debug)]
pub struct PublishArgs {
    /// Root page URL or id
    pub root: String,

    /// Crawl the content API before rendering
    #[arg(long)]
    pub fetch: bool,

    /// Only refresh pages edited in the last DAYS days, keeping older cached pages
    #[arg(long, value_name = "DAYS")]
    pub since: Option<u64>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct MailArgs {
    /// Digest to send
    #[arg(long)]
    pub html: PathBuf,

    #[arg(long)]
    pub subject: String,

    /// HTML document whose body is appended to the message
    #[arg(long)]
    pub footer: Option<PathBuf>,

    /// Sender address
    #[arg(long)]
    pub from: String,

    /// Recipients: a file with one address per line or a comma separated list
    #[arg(long)]
    pub to: Option<String>,

    #[arg(long)]
    pub cc: Option<String>,

    #[arg(long)]
    pub bcc: Option<String>,

    /// Send BCC recipients in batches of this size (0 sends one message)
    #[arg(long, default_value_t = 0)]
    pub batch: usize,

    /// Send the drafts instead of only creating them
    #[arg(long)]
    pub commit: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_publish() {
        let args = Args::parse_from(["digest-press", "publish", "--fetch", "--since", "7", "abc"]);
        match args.command {
            Command::Publish(publish) => {
                assert_eq!(publish.root, "abc");
                assert!(publish.fetch);
                assert_eq!(publish.since, Some(7));
                assert!(publish.config.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_mail() {
        let args = Args::parse_from([
            "digest-press",
            "mail",
            "--html",
            "d.html",
            "--subject",
            "News",
            "--from",
            "a@example.org",
            "--bcc",
            "list.txt",
            "--batch",
            "50",
        ]);
        match args.command {
            Command::Mail(mail) => {
                assert_eq!(mail.bcc.as_deref(), Some("list.txt"));
                assert_eq!(mail.batch, 50);
                assert!(!mail.commit);
                assert!(mail.to.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
