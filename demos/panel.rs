// Keyboard operator panel: 1-9 pick destination, S stop, R resume, H help,
// C confirm, X cancel, Q quit. Stands in for the touch screen.
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::Duration;
use tracing::{info, warn};

use jacart_console::catalog::Catalog;
use jacart_console::config::TOPIC_UI_REQUEST;
use jacart_console::messages::UiRequest;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_UI_REQUEST).await?;

    let catalog = Catalog::campus();
    for (i, destination) in catalog.all().iter().enumerate() {
        info!("{}: {}", i + 1, destination.display_name);
    }
    info!("Controls: 1-9=go to, S=stop, R=resume, H=help, C=confirm, X=cancel, Q=quit");

    enable_raw_mode()?;
    let result = run_panel(&publisher, &catalog).await;
    disable_raw_mode()?;

    result
}

async fn run_panel(
    publisher: &zenoh::pubsub::Publisher<'_>,
    catalog: &Catalog,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(KeyEvent { code, kind, .. }) = event::read()? else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }

        let request = match code {
            KeyCode::Char(c @ '1'..='9') => {
                let index = c as usize - '1' as usize;
                match catalog.all().get(index) {
                    Some(destination) => UiRequest::Select {
                        name: destination.name.clone(),
                    },
                    None => {
                        warn!("No destination {}", c);
                        continue;
                    }
                }
            }
            KeyCode::Char('s') => UiRequest::Stop,
            KeyCode::Char('r') => UiRequest::Resume,
            KeyCode::Char('h') => UiRequest::Help,
            KeyCode::Char('c') => UiRequest::Confirm,
            KeyCode::Char('x') => UiRequest::Cancel,
            KeyCode::Char('q') | KeyCode::Esc => break,
            _ => continue,
        };

        info!("Sending {:?}", request);
        publisher.put(serde_json::to_string(&request)?).await?;
    }

    Ok(())
}
