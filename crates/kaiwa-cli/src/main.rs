// kaiwa-cli: CLI frontend for the kaiwa chat client engine
// Argument parsing, terminal output, credential file handling

mod cli;
mod config;
mod output;

use clap::Parser;
use cli::{Cli, Command};
use kaiwa_core::{
    ChatClient, Error, FileCredentialStore, LoadMode, ReqwestHttp, SendAttempt, StreamAbort,
    StreamEnd,
};
use log::debug;
use output::StdoutSink;
use std::io::{self, Write};

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("kaiwa: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let home = config::kaiwa_home(cli.home.as_deref())?;
    debug!("kaiwa home: {}", home.display());
    let client_config = config::load_config(&home)?;
    let credentials = FileCredentialStore::load(&config::credentials_path(&home))?;
    let http = ReqwestHttp::new(&client_config.base_url)?;
    let client = ChatClient::new(http, Box::new(credentials), client_config);

    match cli.command {
        Command::Login { login } => {
            let password = prompt_password()?;
            client.login(&login, &password).await?;
            let user = client.me().await?;
            println!("logged in as {}", user.login.unwrap_or(user.id));
        }
        Command::Logout => {
            client.logout().await?;
            println!("logged out");
        }
        Command::Me => {
            let user = client.restore_session().await?;
            match user.login {
                Some(login) => println!("{} ({})", login, user.id),
                None => println!("{}", user.id),
            }
        }
        Command::Chats { more } => {
            let mode = if more { LoadMode::More } else { LoadMode::Reset };
            client.load_chats(mode).await?;
            let store = client.store();
            for chat in store.chats() {
                let name = chat.name.as_deref().unwrap_or("(unnamed)");
                if chat.tags.is_empty() {
                    println!("{}  {}", chat.id, name);
                } else {
                    println!("{}  {}  [{}]", chat.id, name, chat.tags.join(", "));
                }
            }
            if store.chats_has_more() {
                println!("(more available: kaiwa chats --more)");
            }
        }
        Command::New { name, tags } => {
            let chat = client.create_chat(name.as_deref(), &tags).await?;
            println!("{}", chat.id);
        }
        Command::Rename { chat_id, name } => {
            client.update_chat(&chat_id, Some(&name), None).await?;
            println!("renamed {}", chat_id);
        }
        Command::Rm { chat_id } => {
            client.delete_chat(&chat_id).await?;
            println!("deleted {}", chat_id);
        }
        Command::History { chat_id, more } => {
            let mode = if more { LoadMode::More } else { LoadMode::Reset };
            client.load_messages(&chat_id, mode).await?;
            let store = client.store();
            for message in store.messages(&chat_id) {
                println!("[{}] {}", message.role.as_str(), message.content);
            }
            if store
                .message_page(&chat_id)
                .is_some_and(|page| page.has_more)
            {
                println!("(more available: kaiwa history {} --more)", chat_id);
            }
        }
        Command::Send {
            chat_id,
            content,
            no_stream,
            no_rag,
        } => {
            let attempt = SendAttempt::new(&content).with_rag(!no_rag);
            if no_stream {
                let reply = client.send_message(&chat_id, &attempt).await?;
                println!("{}", reply.content);
            } else {
                let abort = StreamAbort::new();
                let handle = abort.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        handle.abort();
                    }
                });
                let mut sink = StdoutSink::new();
                let end = client
                    .send_streaming(&chat_id, &attempt, &abort, &mut sink)
                    .await?;
                if let StreamEnd::Failed { error, .. } = end {
                    return Err(error);
                }
            }
        }
    }
    Ok(())
}

/// Prompt for a password on stderr and read it from stdin.
fn prompt_password() -> Result<String, Error> {
    eprint!("Password: ");
    io::stderr()
        .flush()
        .map_err(|e| Error::config(format!("writing prompt: {}", e)))?;
    let mut password = String::new();
    io::stdin()
        .read_line(&mut password)
        .map_err(|e| Error::config(format!("reading password: {}", e)))?;
    Ok(password.trim_end_matches(['\r', '\n']).to_string())
}
