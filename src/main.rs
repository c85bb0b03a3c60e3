use clap::Parser;
use digest_press::Publisher;
use digest_press::error::MailError;
use digest_press::mail::{
    Dispatcher, GmailMailer, MailMessage, Recipients, load_addresses, read_text,
};
use std::error::Error;

mod args;
use args::{Args, Command, MailArgs, PublishArgs};

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();
    let result = match args.command {
        Command::Publish(publish_args) => publish(publish_args).await,
        Command::Mail(mail_args) => mail(mail_args).await,
    };

    if let Err(e) = result {
        ::log::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn publish(args: PublishArgs) -> Result<(), Box<dyn Error>> {
    let mut publisher = Publisher::new(&args.root)
        .with_fetch(args.fetch)
        .with_since(args.since);
    if let Some(path) = &args.config {
        publisher = publisher.with_config_file(path)?;
    }

    let start_time = std::time::Instant::now();
    let written = publisher.run().await?;
    ::log::info!(
        "Publishing complete - wrote {} files in {:.2} seconds",
        written.len(),
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

async fn mail(args: MailArgs) -> Result<(), Box<dyn Error>> {
    let html = read_text(&args.html)?;
    let mut message = MailMessage::new(&args.from, &args.subject, &html)?;
    if let Some(footer) = &args.footer {
        message = message.with_footer(&read_text(footer)?);
    }

    let addresses = |source: &Option<String>| match source {
        Some(source) => load_addresses(source),
        None => Ok(Vec::new()),
    };
    let recipients = Recipients {
        to: addresses(&args.to)?,
        cc: addresses(&args.cc)?,
        bcc: addresses(&args.bcc)?,
    };
    if recipients.is_empty() {
        return Err(MailError::NoRecipients.into());
    }
    ::log::info!("Mailing {} to {} recipients", args.subject, recipients.len());

    let mailer = GmailMailer::from_env()?;
    let dispatcher = Dispatcher::new(&mailer, args.commit);
    if args.batch > 0 {
        dispatcher.batch_send(&message, &recipients, args.batch).await?;
    } else {
        dispatcher.send(&message, &recipients).await?;
    }
    Ok(())
}
