//! Shared UI icons.
//!
//! Each icon falls back to plain ASCII on terminals without emoji support.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR] ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN] ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "[SKIP] ");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "* ");

// Run indicators
pub static RUNNING: Emoji<'_, '_> = Emoji("▶️  ", "[>] ");
pub static WAVE: Emoji<'_, '_> = Emoji("🌊 ", "[W] ");
pub static WORKER: Emoji<'_, '_> = Emoji("🤖 ", "- ");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T] ");
