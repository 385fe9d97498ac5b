//! Watch Module - the interactive supervisor
//!
//! - `watcher`: file events → debounced test runs
//! - `keyboard`: hotkeys, including the blocking hint prompt
//! - `render`: fixed-tick frame drawing
//! - `terminal`: raw mode guard and the render gate shared with prompts
//! - `supervisor`: startup, wiring and shutdown

mod keyboard;
mod render;
mod supervisor;
mod terminal;
mod theme;
mod watcher;

pub use keyboard::{Flow, Hotkey, HotkeyHandler, KeyboardAgent, ASK_PROMPT};
pub use render::{draw_frame, run_render_loop, FrameModel, FrameSurface};
pub use supervisor::{SessionSummary, WatchSupervisor};
pub use terminal::{CrosstermPrompt, PromptLease, PromptTerminal, RenderGate, TerminalGuard};
pub use theme::Theme;
pub use watcher::{drain_pending, next_burst, relevant_path, ChangeTrigger, FileWatchAgent};
