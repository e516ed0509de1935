//! See the library documentation for more information.

mod app;

use app::{
    cli::{AppHelper, Command},
    CompilationCommand, ModelCountingCommand, PrintCnfCommand,
};

pub(crate) fn create_app_helper() -> AppHelper {
    let app_name = option_env!("CARGO_PKG_NAME").unwrap_or("unknown app name");
    let app_version = option_env!("CARGO_PKG_VERSION").unwrap_or("unknown version");
    let mut app = AppHelper::new(
        app_name,
        app_version,
        "sharpdnnf-rs, a top-down Decision-DNNF compiler and model counter.",
    );
    let commands: Vec<Box<dyn Command>> = vec![
        Box::<CompilationCommand>::default(),
        Box::<ModelCountingCommand>::default(),
        Box::<PrintCnfCommand>::default(),
    ];
    for c in commands {
        app.add_command(c);
    }
    app
}

fn main() {
    let app = create_app_helper();
    app.launch_app();
}
