//! Terminal output
//!
//! Uses `cliclack` for spinners and prompts on a terminal and falls back to
//! plain tagged lines in CI or when output is piped.
//!
//! ```rust,ignore
//! use extsync::ui::{self, TaskSpinner, UiContext};
//!
//! let ctx = UiContext::detect();
//! ui::intro(&ctx, "extsync setup");
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Syncing vendor/plugins/foo...");
//! spinner.stop("vendor/plugins/foo (2 completed, 1 skipped)");
//!
//! ui::outro_success(&ctx, "1 module(s) ready");
//! ```

mod context;
mod output;
mod progress;
mod prompts;
mod theme;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, outro_error, outro_success, remark, section, step_error,
    step_error_detail, step_info, step_ok, step_ok_detail, step_warn_hint,
};
pub use progress::TaskSpinner;
pub use prompts::confirm;
pub use theme::{init_theme, ExtsyncTheme};
