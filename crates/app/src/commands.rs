//! Subcommand implementations.

use std::error::Error;

use chatdesk_domain::{AppealPatch, Credentials, DialogMessage, PageRequest, RegistrationData};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::console::Console;

type CommandResult = Result<(), Box<dyn Error>>;

pub async fn login(console: &Console, email: String, password: String) -> CommandResult {
    let user = console.auth.login(&Credentials::new(email, password)).await?;
    println!("Signed in as {} <{}>", user.name, user.email);
    Ok(())
}

pub async fn register(
    console: &Console,
    name: String,
    email: String,
    password: String,
    company_name: Option<String>,
    phone: Option<String>,
) -> CommandResult {
    let data = RegistrationData {
        name,
        email,
        password,
        company_name,
        phone,
    };
    let user = console.auth.register(&data).await?;
    println!("Account created. Signed in as {} <{}>", user.name, user.email);
    Ok(())
}

pub async fn logout(console: &Console) -> CommandResult {
    console.auth.initialize().await;
    console.auth.logout().await;
    println!("Signed out");
    Ok(())
}

pub async fn whoami(console: &Console) -> CommandResult {
    let state = console.auth.initialize().await;
    match state.user() {
        Some(user) => {
            println!("{} <{}>", user.name, user.email);
            if let Some(role) = &user.role {
                println!("role:     {role}");
            }
            if let Some(company_id) = user.company_id {
                println!("company:  {company_id}");
            }
        }
        None => println!("Not signed in"),
    }
    println!("session:  {}", console.session.token_status().display_message());
    Ok(())
}

pub async fn appeals(
    console: &Console,
    company: Option<i64>,
    limit: u32,
    offset: u32,
) -> CommandResult {
    let user = console.require_user().await?;
    let service = console.dialogs(&user, console.dialog_store());
    let page = service
        .load_appeals(company.or(user.company_id), PageRequest::new(limit, offset))
        .await?;

    for appeal in &page.results {
        println!(
            "#{:<6} {:<12} {:<20} {}",
            appeal.id,
            appeal.status.as_deref().unwrap_or("-"),
            appeal.client_name.as_deref().unwrap_or("-"),
            appeal.last_message.as_deref().unwrap_or(""),
        );
    }
    print_window(page.offset, page.results.len(), page.total);
    Ok(())
}

pub async fn appeal(console: &Console, appeal_id: i64) -> CommandResult {
    let user = console.require_user().await?;
    let service = console.dialogs(&user, console.dialog_store());
    let appeal = service.get_appeal(appeal_id).await?;

    println!("#{}", appeal.id);
    println!("status:   {}", appeal.status.as_deref().unwrap_or("-"));
    println!("client:   {}", appeal.client_name.as_deref().unwrap_or("-"));
    println!("channel:  {}", appeal.channel.as_deref().unwrap_or("-"));
    if let Some(operator_id) = appeal.operator_id {
        println!("operator: {operator_id}");
    }
    if let Some(active) = appeal.is_bot_active {
        println!("bot:      {}", if active { "on" } else { "off" });
    }
    println!("unread:   {}", appeal.unread_count);
    Ok(())
}

pub async fn messages(console: &Console, appeal_id: i64, limit: u32, offset: u32) -> CommandResult {
    let user = console.require_user().await?;
    let store = console.dialog_store();
    let service = console.dialogs(&user, store.clone());
    let page = service
        .load_messages(appeal_id, PageRequest::new(limit, offset))
        .await?;

    for message in store.messages(appeal_id) {
        print_message(&message);
    }
    print_window(page.offset, page.results.len(), page.total);
    Ok(())
}

pub async fn send(console: &Console, appeal_id: i64, text: &str) -> CommandResult {
    let user = console.require_user().await?;
    let service = console.dialogs(&user, console.dialog_store());
    let message = service.send_message(appeal_id, text).await?;
    print_message(&message);
    Ok(())
}

pub async fn set_status(console: &Console, appeal_id: i64, status: String) -> CommandResult {
    let user = console.require_user().await?;
    let service = console.dialogs(&user, console.dialog_store());
    let appeal = service
        .update_appeal(appeal_id, &AppealPatch::status(status))
        .await?;
    println!(
        "#{} is now {}",
        appeal.id,
        appeal.status.as_deref().unwrap_or("-")
    );
    Ok(())
}

pub async fn watch(console: &Console, company: Option<i64>) -> CommandResult {
    let user = console.require_user().await?;
    let company_id = company
        .or(user.company_id)
        .ok_or("the signed-in user has no company; pass --company")?;

    let store = console.dialog_store();
    let channel = console.realtime(store);
    let closer = channel.close_on_session_end(console.auth.subscribe());
    let checker = console.auth.spawn_background_check();
    let mut events = console.auth.subscribe();

    channel.open(console.config.topic(company_id)).await;
    info!(company_id, state = channel.state().as_str(), "watching; press Ctrl-C to stop");

    let outcome: CommandResult = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                break signal.map_err(Into::into);
            }
            event = events.recv() => match event {
                Ok(event) if event.ends_session() => {
                    break Err(format!("session ended ({event:?}); sign in again").into());
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "session events lagged"),
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    channel.close();
    closer.abort();
    checker.abort();
    let info = channel.info();
    println!(
        "received {} frames ({} undecodable), sent {}",
        info.frames_received, info.frames_dropped, info.frames_sent
    );
    outcome
}

fn print_message(message: &DialogMessage) {
    println!(
        "[{}] {:<16} {:?}: {}",
        message.created_at.format("%Y-%m-%d %H:%M"),
        message.sender.name,
        message.status,
        message.text
    );
}

fn print_window(offset: u32, shown: usize, total: u64) {
    if shown > 0 {
        println!("-- {}..{} of {total}", offset + 1, u64::from(offset) + shown as u64);
    } else {
        println!("-- nothing to show ({total} total)");
    }
}
