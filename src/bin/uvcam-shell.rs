//! Interactive camera browser.
//!
//! Reads commands from stdin; discovery runs on a worker thread so the shell stays
//! responsive while libusb is busy.

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    sync::Arc,
    thread,
};

use clap::Parser;
use crossbeam::channel::{unbounded, Receiver, Sender};
use uvcam::{
    export::export_cameras,
    lister::{format_list, NO_CAMERAS},
    media::SysfsMedia,
    menu::{self, MenuAction, MenuItem},
    session::{RefreshJob, RefreshOutcome, Session, ViewModel, ViewState},
    Discovery, Libusb,
};

type SystemSession = Session<Libusb, SysfsMedia>;

/// Browse and preview the USB Video Class cameras attached to this machine.
#[derive(Parser, Debug)]
#[command(name = "uvcam-shell", version)]
struct Args {
    /// Directory exported camera data is written to
    #[arg(long, value_name = "DIR", default_value = ".")]
    export_dir: PathBuf,
}

const HELP: &str = "\
commands:
  r, refresh      rescan for cameras
  <n>             preview camera number <n>
  c, close        close the preview
  s, status       show the preview overlay
  e, export       export camera data
  j, json         print the camera list as JSON
  m, menu         show the menu
  q, quit         exit";

enum Event {
    Line(String),
    Refreshed(RefreshOutcome),
    /// stdin was closed
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Menu(MenuAction),
    Status,
    Json,
    ShowMenu,
    Help,
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if let Ok(n) = line.parse::<usize>() {
        return n.checked_sub(1).map(|i| Command::Menu(MenuAction::SelectCamera(i)));
    }
    let cmd = match line {
        "r" | "refresh" => Command::Menu(MenuAction::Refresh),
        "c" | "close" => Command::Menu(MenuAction::ClosePreview),
        "e" | "export" => Command::Menu(MenuAction::ExportCameras),
        "q" | "quit" | "exit" => Command::Menu(MenuAction::Quit),
        "s" | "status" => Command::Status,
        "j" | "json" => Command::Json,
        "m" | "menu" => Command::ShowMenu,
        "h" | "help" | "?" => Command::Help,
        _ => return None,
    };
    Some(cmd)
}

fn main() {
    env_logger::init();

    let args = Args::parse();
    let mut session = Session::new(Arc::new(Discovery::system()));
    let (outcome_tx, outcome_rx) = unbounded();
    let lines = spawn_stdin_reader();

    // startup refresh
    if let Some(job) = session.begin_refresh() {
        spawn_refresh(job, outcome_tx.clone());
    }
    show(&session.view_model());

    prompt();

    loop {
        let event = crossbeam::select! {
            recv(lines) -> line => line.map(Event::Line).unwrap_or(Event::Closed),
            recv(outcome_rx) -> outcome => outcome.map(Event::Refreshed).unwrap_or(Event::Closed),
        };

        session.reap_preview();
        match event {
            Event::Closed => break,
            Event::Refreshed(outcome) => {
                session.finish_refresh(outcome);
                show(&session.view_model());
            }
            Event::Line(line) if line.trim().is_empty() => {}
            Event::Line(line) => match parse_command(&line) {
                Some(Command::Menu(action)) => {
                    if !apply(&mut session, action, &args, &outcome_tx) {
                        break;
                    }
                }
                Some(Command::Status) => match (session.overlay(), session.preview_error()) {
                    (Some(overlay), _) => println!("{}", overlay),
                    (None, Some(e)) => println!("no preview running ({})", e),
                    (None, None) => println!("no preview running"),
                },
                Some(Command::Json) => {
                    match serde_json::to_string_pretty(&session.list_response()) {
                        Ok(json) => println!("{}", json),
                        Err(e) => eprintln!("error: {}", e),
                    }
                }
                Some(Command::ShowMenu) => print_menu(&menu::render(&session.view_model()), 0),
                Some(Command::Help) => println!("{}", HELP),
                None => println!("unknown command {:?}, type `help`", line.trim()),
            },
        }
        prompt();
    }

    session.close_preview();
}

/// Runs a menu action if the menu currently allows it. Returns `false` to quit.
fn apply(
    session: &mut SystemSession,
    action: MenuAction,
    args: &Args,
    outcomes: &Sender<RefreshOutcome>,
) -> bool {
    let view = session.view_model();
    let menu = menu::render(&view);
    match MenuItem::find(&menu, action) {
        Some(item) if item.enabled => {}
        Some(item) => {
            println!("{:?} is not available right now", item.label);
            return true;
        }
        None => {
            println!("no such entry");
            return true;
        }
    }

    match action {
        MenuAction::Refresh => {
            if let Some(job) = session.begin_refresh() {
                spawn_refresh(job, outcomes.clone());
            }
        }
        MenuAction::SelectCamera(i) => session.select_camera(i),
        MenuAction::ClosePreview => session.close_preview(),
        MenuAction::ExportCameras => match export_cameras(session.cameras(), &args.export_dir) {
            Ok(path) => println!("exported to {}", path.display()),
            Err(e) => eprintln!("error: {}", e),
        },
        MenuAction::Quit => return false,
    }
    show(&session.view_model());
    true
}

fn spawn_refresh(job: RefreshJob<Libusb, SysfsMedia>, outcomes: Sender<RefreshOutcome>) {
    thread::spawn(move || {
        // the receiver only goes away when the shell exits
        let _ = outcomes.send(job.run());
    });
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    log::error!("failed to read stdin: {}", e);
                    break;
                }
            };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn show(view: &ViewModel) {
    match &view.state {
        ViewState::Loading => println!("Scanning for cameras..."),
        ViewState::Empty => println!("{}", NO_CAMERAS),
        ViewState::CameraList => println!("{}", format_list(&view.cameras)),
        ViewState::Error(message) => {
            println!("Error: {}", message);
            println!("Type `r` to retry.");
        }
    }
    if let Some((camera, overlay)) = &view.preview {
        println!("Previewing {}: {} (type `c` to close)", camera.name(), overlay);
    }
    if let Some(e) = &view.preview_error {
        println!("Preview unavailable: {}", e);
    }
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

fn print_menu(items: &[MenuItem], depth: usize) {
    for item in items {
        if item.is_separator() {
            println!("{:indent$}----", "", indent = depth * 2);
            continue;
        }
        let mark = if item.checked { "* " } else { "" };
        let state = if item.enabled { "" } else { " (disabled)" };
        match item.accelerator {
            Some(accel) => println!(
                "{:indent$}{}{} [{}]{}",
                "",
                mark,
                item.label,
                accel,
                state,
                indent = depth * 2
            ),
            None => println!(
                "{:indent$}{}{}{}",
                "",
                mark,
                item.label,
                state,
                indent = depth * 2
            ),
        }
        print_menu(&item.submenu, depth + 1);
    }
}
