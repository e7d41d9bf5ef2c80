mod app;
mod graph_data;
mod solver;
mod util;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to the graph description JSON file.
    graph_file: String,

    #[arg(long, default_value_t = 1280.0)]
    window_width: f32,

    #[arg(long, default_value_t = 860.0)]
    window_height: f32,
}

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([args.window_width, args.window_height]),
        ..Default::default()
    };

    eframe::run_native(
        "notegraph",
        options,
        Box::new(move |cc| Ok(Box::new(app::NoteGraphApp::new(cc, args.graph_file.clone())))),
    )
}
