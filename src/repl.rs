use crate::controller::{ControllerState, ConversationController};
use crate::models::Model;
use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Commands:
  /new                 start a new conversation
  /list                list conversations
  /select <n>          switch to conversation n (from /list)
  /delete <n>          delete conversation n
  /history             show the active thread with message ids
  /edit <id> <text>    replace message <id> and everything after it
  /models              list models
  /model <id>          switch model
  /quit                exit
Anything else is sent as a message.";

// One line of user intent
#[derive(Debug, PartialEq)]
enum Command<'a> {
    New,
    List,
    Select(usize),
    Delete(usize),
    History,
    Edit { id: &'a str, content: &'a str },
    Models,
    SetModel(&'a str),
    Help,
    Quit,
    Send(&'a str),
    Invalid(&'static str),
}

fn parse_command(line: &str) -> Command<'_> {
    let line = line.trim();
    if !line.starts_with('/') {
        return Command::Send(line);
    }
    let (name, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let index = |usage: &'static str| match rest.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(Command::Invalid(usage)),
    };
    match name {
        "/new" => Command::New,
        "/list" => Command::List,
        "/select" => index("usage: /select <n>").map_or_else(|e| e, Command::Select),
        "/delete" => index("usage: /delete <n>").map_or_else(|e| e, Command::Delete),
        "/history" => Command::History,
        "/edit" => match rest.split_once(' ') {
            Some((id, content)) if !content.trim().is_empty() => Command::Edit {
                id,
                content: content.trim(),
            },
            _ => Command::Invalid("usage: /edit <id> <text>"),
        },
        "/models" => Command::Models,
        "/model" if !rest.is_empty() => Command::SetModel(rest),
        "/model" => Command::Invalid("usage: /model <id>"),
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        _ => Command::Invalid("unknown command, try /help"),
    }
}

fn print_conversations(state: &ControllerState) {
    if state.conversations.is_empty() {
        println!("(no conversations)");
        return;
    }
    for (i, conversation) in state.conversations.iter().enumerate() {
        let marker = if state.active_id.as_deref() == Some(conversation.id.as_str()) { "*" } else { " " };
        println!(
            "{} {:>2}. {}  ({})",
            marker,
            i + 1,
            conversation.title,
            conversation.created_at.format("%Y-%m-%d %H:%M")
        );
    }
}

fn print_history(state: &ControllerState) {
    for message in &state.messages {
        println!("[{}] {}: {}", message.id, message.role.label(), message.content);
    }
}

fn conversation_id_at(state: &ControllerState, index: usize) -> Option<String> {
    state.conversations.get(index).map(|c| c.id.clone())
}

/// Reads commands from stdin until EOF or `/quit`.
pub async fn run_repl(controller: ConversationController) -> Result<()> {
    let state = controller.snapshot().await;
    println!("Model: {}, type /help for commands", state.selected_model.display_name());
    print_conversations(&state);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read from stdin")? {
        match parse_command(&line) {
            Command::Send("") => continue,
            Command::Send(content) => send_and_print(&controller, content, None).await,
            Command::Edit { id, content } => send_and_print(&controller, content, Some(id)).await,
            Command::New => {
                controller.create_conversation().await;
                println!("Started a new conversation.");
            }
            Command::List => print_conversations(&controller.snapshot().await),
            Command::Select(index) => match conversation_id_at(&controller.snapshot().await, index) {
                Some(id) => {
                    controller.select_conversation(&id).await;
                    print_history(&controller.snapshot().await);
                }
                None => println!("No conversation {}", index + 1),
            },
            Command::Delete(index) => match conversation_id_at(&controller.snapshot().await, index) {
                Some(id) => {
                    controller.delete_conversation(&id).await;
                    print_conversations(&controller.snapshot().await);
                }
                None => println!("No conversation {}", index + 1),
            },
            Command::History => print_history(&controller.snapshot().await),
            Command::Models => {
                let selected = controller.snapshot().await.selected_model;
                for model in Model::ALL {
                    let marker = if model == selected { "*" } else { " " };
                    println!("{} {:<22} {} - {}", marker, model.id(), model.display_name(), model.description());
                }
            }
            Command::SetModel(id) => match Model::from_id(id) {
                Some(model) => {
                    controller.set_model(model).await;
                    println!("Switched to {}", model.display_name());
                }
                None => println!("Unknown model '{}', try /models", id),
            },
            Command::Help => println!("{}", HELP),
            Command::Invalid(usage) => println!("{}", usage),
            Command::Quit => break,
        }
    }

    controller.wait_for_titles().await;
    Ok(())
}

async fn send_and_print(controller: &ConversationController, content: &str, edit_id: Option<&str>) {
    if let Err(e) = controller.send_message(content, edit_id).await {
        println!("{}", e);
        return;
    }
    if let Some(reply) = controller.snapshot().await.messages.last() {
        println!("{}: {}", reply.role.label(), reply.content);
    }
}
