use std::io::{self, Write};

use anyhow::Result;
use quill_core::client::GeminiClient;
use quill_core::settings;
use quill_core::storage::SqliteStore;
use quill_core::store::ConversationStore;
use quill_core::{Message, QuillError, Role};

pub async fn run(
    client: GeminiClient,
    mut store: ConversationStore<SqliteStore>,
    storage: SqliteStore,
) -> Result<()> {
    println!("quill: chat with Gemini. Type /help for commands, /quit to exit.\n");

    loop {
        let Some(input) = read_line("> ")? else {
            break; // EOF
        };
        if input.is_empty() {
            continue;
        }

        if let Some(command) = input.strip_prefix('/') {
            if handle_command(command, &mut store, &storage)? {
                break;
            }
            continue;
        }

        chat_turn(&client, &mut store, &storage, &input).await;
    }

    println!("Goodbye!");
    Ok(())
}

async fn chat_turn(
    client: &GeminiClient,
    store: &mut ConversationStore<SqliteStore>,
    storage: &SqliteStore,
    input: &str,
) {
    let conversation_id = match store.current_id() {
        Some(id) => id.to_string(),
        None => store.create_conversation(),
    };

    store.append_message(&conversation_id, Message::new(Role::User, input));

    let history = match store.current() {
        Some(conversation) => conversation.messages.clone(),
        None => return,
    };
    let system_prompt = settings::system_prompt(storage);

    let send = client.send(&history, Some(&system_prompt), |delta| {
        print!("{delta}");
        let _ = io::stdout().flush();
    });
    tokio::pin!(send);

    // Ctrl-C trips the cancel token; the send observes it at the next
    // fragment boundary and returns Cancelled.
    let reply = loop {
        tokio::select! {
            result = &mut send => break result,
            _ = tokio::signal::ctrl_c() => client.cancel(),
        }
    };

    match reply {
        Ok(text) => {
            println!();
            store.append_message(&conversation_id, Message::new(Role::Assistant, text));
        }
        Err(QuillError::Cancelled) => {
            // Not an error; the partial text stays on screen but is not saved.
            println!("\n[stopped]");
        }
        Err(e) => {
            eprintln!("\nError: {}", e);
        }
    }
}

/// Returns Ok(true) when the user asked to quit.
fn handle_command(
    command: &str,
    store: &mut ConversationStore<SqliteStore>,
    storage: &SqliteStore,
) -> Result<bool> {
    let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
    let rest = rest.trim();

    match name {
        "quit" | "q" | "exit" => return Ok(true),
        "help" => print_help(),
        "new" => {
            store.create_conversation();
            println!("Started a new chat.");
        }
        "list" => {
            if store.conversations().is_empty() {
                println!("No saved chats.");
            }
            for (i, conversation) in store.conversations().iter().enumerate() {
                let marker = if store.current_id() == Some(conversation.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{marker} {:>2}. {} ({} messages, {})",
                    i + 1,
                    conversation.title,
                    conversation.messages.len(),
                    conversation.last_activity.format("%Y-%m-%d %H:%M")
                );
            }
        }
        "open" => match lookup_id(store, rest) {
            Some(id) => {
                store.set_current(&id);
                if let Some(conversation) = store.current() {
                    println!("-- {} --", conversation.title);
                    for message in &conversation.messages {
                        let who = match message.role {
                            Role::User => "you",
                            Role::Assistant => "gemini",
                        };
                        println!("{who}: {}", message.content);
                    }
                }
            }
            None => println!("Usage: /open <number> (see /list)"),
        },
        "delete" => match lookup_id(store, rest) {
            Some(id) => {
                store.delete_conversation(&id);
                println!("Deleted.");
            }
            None => println!("Usage: /delete <number> (see /list)"),
        },
        "rename" => {
            if rest.is_empty() {
                println!("Usage: /rename <new title>");
            } else if let Some(id) = store.current_id().map(str::to_string) {
                store.rename(&id, rest);
                println!("Renamed.");
            } else {
                println!("No chat selected.");
            }
        }
        "system" => {
            if rest.is_empty() {
                println!("{}", settings::system_prompt(storage));
            } else {
                settings::set_system_prompt(storage, rest)?;
                println!("System prompt updated.");
            }
        }
        "clear" => {
            store.clear_all();
            println!("History cleared.");
        }
        _ => println!("Unknown command: /{name} (try /help)"),
    }

    Ok(false)
}

fn lookup_id(store: &ConversationStore<SqliteStore>, arg: &str) -> Option<String> {
    let n: usize = arg.parse().ok()?;
    if n == 0 || n > store.conversations().len() {
        return None;
    }
    Some(store.conversations()[n - 1].id.clone())
}

fn print_help() {
    println!("Commands:");
    println!("  /new              start a new chat");
    println!("  /list             list saved chats");
    println!("  /open <n>         switch to a chat from /list");
    println!("  /delete <n>       delete a chat from /list");
    println!("  /rename <title>   retitle the current chat");
    println!("  /system [text]    show or set the system prompt");
    println!("  /clear            delete all chat history");
    println!("  /quit             exit");
    println!("Anything else is sent to the model. Ctrl-C stops a streaming reply.");
}

/// Reads one trimmed line from stdin; `None` on EOF.
fn read_line(prompt: &str) -> Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}
