// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interactive terminal front-end for the bulletin board.
use std::path::PathBuf;

use agrilink::{
    Action, Config, Draft, EditOutcome, FileStore, HistoryOutcome, Outcome, Registration, Role,
    Session, Workflow, WorkflowError,
};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const HELP: &str = "commands:
  register            fill in and confirm a new listing
  list <role>         show producer, buyer or volunteer listings
  availability        total quantity offered per crop
  edit <code>         change the listing belonging to a possession code
  delete <code>       remove the listing belonging to a possession code
  undo | redo         step through the changes made in this session
  help | quit";

pub fn setup_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();
}

#[derive(Parser)]
struct Args {
    /// JSON file holding all registrations, created on first write.
    #[arg(short = 's', long, value_name = "PATH", default_value = "registrations.json")]
    store: PathBuf,

    /// JSON configuration file, command line options take precedence.
    #[arg(short = 'c', long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Region used for phone numbers entered without country code.
    #[arg(short = 'r', long, value_name = "REGION")]
    region: Option<String>,

    /// Number of characters in generated possession codes.
    #[arg(long, value_name = "LENGTH")]
    code_length: Option<usize>,

    /// Base URL of the messaging channel confirmation links open.
    #[arg(long, value_name = "URL")]
    channel_url: Option<String>,

    /// Maximum number of undo steps kept per session.
    #[arg(long, value_name = "STEPS")]
    history_limit: Option<usize>,
}

impl Args {
    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(region) = &self.region {
            config.default_region = region.clone();
        }
        if let Some(code_length) = self.code_length {
            config.code_length = code_length;
        }
        if let Some(channel_url) = &self.channel_url {
            config.channel_url = channel_url.clone();
        }
        if self.history_limit.is_some() {
            config.history_limit = self.history_limit;
        }
        Ok(config)
    }
}

/// Line-based questions on stdin.
struct Prompt {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompt {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Ask a question, `None` once stdin is closed.
    async fn ask(&mut self, question: &str) -> Result<Option<String>> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(question.as_bytes()).await?;
        stdout.flush().await?;
        Ok(self.lines.next_line().await?)
    }

    /// Ask with a pre-filled answer which is kept when the input is left empty.
    async fn ask_or_keep(&mut self, label: &str, current: &str) -> Result<Option<String>> {
        let answer = self.ask(&format!("{label} [{current}]: ")).await?;
        Ok(answer.map(|answer| {
            if answer.trim().is_empty() {
                current.to_owned()
            } else {
                answer
            }
        }))
    }

    async fn confirm(&mut self, question: &str) -> Result<bool> {
        let answer = self.ask(&format!("{question} [y/N] ")).await?;
        Ok(matches!(
            answer.as_deref().map(str::trim),
            Some("y" | "Y" | "yes")
        ))
    }
}

struct Cli {
    workflow: Workflow<FileStore>,
    session: Session,
    prompt: Prompt,
}

impl Cli {
    async fn run(&mut self) -> Result<()> {
        println!("{HELP}");
        while let Some(line) = self.prompt.ask("> ").await? {
            let mut words = line.split_whitespace();
            let command = words.next().unwrap_or_default();
            let argument = words.next();
            debug!(command, "command entered");

            let result = match (command, argument) {
                ("", _) => Ok(()),
                ("register", _) => self.register().await,
                ("list", Some(role)) => self.list(role).await,
                ("availability", _) => self.availability().await,
                ("edit", Some(code)) => self.edit(code).await,
                ("delete", Some(code)) => self.delete(code).await,
                ("undo", _) => self.undo().await,
                ("redo", _) => self.redo().await,
                ("quit" | "exit", _) => break,
                _ => {
                    println!("{HELP}");
                    Ok(())
                }
            };

            if let Err(err) = result {
                match err.downcast_ref::<WorkflowError>() {
                    Some(err) => {
                        if !err.is_retryable() {
                            self.session.cancel();
                        }
                        println!("{err}");
                    }
                    None => return Err(err),
                }
            }
        }
        Ok(())
    }

    async fn register(&mut self) -> Result<()> {
        let Some(role) = self.prompt.ask("role (producer, buyer, volunteer): ").await? else {
            return Ok(());
        };
        let role: Role = match role.trim().parse() {
            Ok(role) => role,
            Err(err) => {
                println!("{err}");
                return Ok(());
            }
        };

        let Some(draft) = self.fill_in(Draft::new(role)).await? else {
            return Ok(());
        };

        let mut request = self.workflow.submit(&mut self.session, &draft).await?;
        loop {
            if request.possible_duplicate {
                println!("note: a very similar {role} listing exists already");
            }
            println!("send this message to confirm your listing:\n  {}", request.link);
            println!(
                "your possession code is {}, keep it to edit or delete the listing",
                request.code
            );

            if !self.prompt.confirm("have you sent the message?").await? {
                self.session.cancel();
                println!("registration discarded");
                return Ok(());
            }

            match self.workflow.acknowledge(&mut self.session).await {
                Ok(outcome) => {
                    info!(code = %outcome.code(), "registered from terminal");
                    println!("registered, possession code {}", outcome.code());
                    return Ok(());
                }
                // Nothing was written, the same confirmation can be acknowledged again.
                Err(err) if err.is_retryable() => println!("{err}"),
                Err(err @ WorkflowError::DuplicateCode(_)) => {
                    println!("{err}");
                    match self.session.pending_confirmation() {
                        Some(reissued) => request = reissued,
                        None => return Ok(()),
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn list(&self, role: &str) -> Result<()> {
        let role: Role = match role.parse() {
            Ok(role) => role,
            Err(err) => {
                println!("{err}");
                return Ok(());
            }
        };

        let entries = self.workflow.listings(role).await?;
        if entries.is_empty() {
            println!("no {role} listings yet");
        }
        for entry in entries {
            println!(
                "{} | {}: {} | {} | {} | {}",
                entry.name,
                role.detail_label(),
                entry.detail,
                entry.quantity.as_deref().unwrap_or("-"),
                entry.address,
                self.workflow.links().contact_link(&entry.contact),
            );
            if let Some(bank_details) = entry.bank_details.filter(|details| !details.is_empty()) {
                println!("    bank details: {bank_details}");
            }
        }
        Ok(())
    }

    async fn availability(&self) -> Result<()> {
        for crop in self.workflow.availability().await? {
            print!("{}: {} from {} listing(s)", crop.crop, crop.total, crop.listings);
            if crop.unquantified > 0 {
                print!(", {} without quantity", crop.unquantified);
            }
            println!();
        }
        Ok(())
    }

    async fn edit(&mut self, code: &str) -> Result<()> {
        let registration = self
            .workflow
            .lookup(&mut self.session, code, Action::Edit)
            .await?;
        let Some(draft) = self.fill_in(draft_of(&registration)).await? else {
            self.session.cancel();
            return Ok(());
        };

        match self.workflow.submit_edit(&mut self.session, &draft).await {
            Ok(EditOutcome::Updated(_)) => {
                println!("listing updated");
                Ok(())
            }
            Ok(EditOutcome::AwaitingReconfirmation(request)) => {
                println!("send this message from the new number to confirm the change:");
                println!("  {}", request.link);
                loop {
                    if !self.prompt.confirm("have you sent the message?").await? {
                        self.session.cancel();
                        println!("change discarded");
                        return Ok(());
                    }
                    match self.workflow.acknowledge(&mut self.session).await {
                        Ok(_) => {
                            println!("listing updated");
                            return Ok(());
                        }
                        Err(err) if err.is_retryable() => println!("{err}"),
                        Err(err) => return Err(err.into()),
                    }
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&mut self, code: &str) -> Result<()> {
        let registration = self
            .workflow
            .lookup(&mut self.session, code, Action::Delete)
            .await?;
        let question = format!(
            "delete the {} listing of {} ({})?",
            registration.role(),
            registration.name,
            registration.listing.detail()
        );
        if !self.prompt.confirm(&question).await? {
            self.session.cancel();
            return Ok(());
        }

        if let Outcome::Deleted(deleted) = self.workflow.confirm_delete(&mut self.session).await? {
            println!("deleted listing {}", deleted.code);
        }
        Ok(())
    }

    async fn undo(&mut self) -> Result<()> {
        match self.workflow.undo(&mut self.session).await? {
            HistoryOutcome::NothingToUndo => println!("nothing to undo"),
            _ => println!("undone"),
        }
        Ok(())
    }

    async fn redo(&mut self) -> Result<()> {
        match self.workflow.redo(&mut self.session).await? {
            HistoryOutcome::NothingToRedo => println!("nothing to redo"),
            _ => println!("redone"),
        }
        Ok(())
    }

    /// Ask for every field of a draft, `None` once stdin is closed.
    async fn fill_in(&mut self, mut draft: Draft) -> Result<Option<Draft>> {
        let role = match draft.role {
            Some(role) => role,
            None => return Ok(None),
        };

        let mut bank_details = draft.bank_details.take().unwrap_or_default();
        let mut fields = vec![
            ("name", &mut draft.name),
            (role.detail_label(), &mut draft.detail),
            ("quantity", &mut draft.quantity),
            ("address", &mut draft.address),
            ("phone number", &mut draft.contact),
        ];
        if role == Role::Producer {
            fields.push(("bank details", &mut bank_details));
        }

        for (label, value) in fields {
            match self.prompt.ask_or_keep(label, value).await? {
                Some(answer) => *value = answer,
                None => return Ok(None),
            }
        }

        if role == Role::Producer {
            draft.bank_details = Some(bank_details);
        }
        Ok(Some(draft))
    }
}

/// Draft pre-filled with the current values of a registration.
fn draft_of(registration: &Registration) -> Draft {
    Draft {
        role: Some(registration.role()),
        name: registration.name.clone(),
        detail: registration.listing.detail().to_owned(),
        quantity: registration.quantity.clone().unwrap_or_default(),
        address: registration.address.clone(),
        contact: format!("+{}", registration.contact),
        bank_details: registration.listing.bank_details().map(str::to_owned),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    setup_logging();

    let args = Args::parse();
    let config = args.config()?;

    let store = FileStore::open(&args.store)
        .await
        .with_context(|| format!("opening store {}", args.store.display()))?;
    let workflow = Workflow::from_config(store, &config)?;

    println!("store: {}", args.store.display());
    println!("region: {}", config.default_region);

    let mut cli = Cli {
        session: workflow.session(),
        workflow,
        prompt: Prompt::new(),
    };
    cli.run().await
}
