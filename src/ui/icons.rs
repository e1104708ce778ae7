//! Shared UI icons.
//!
//! Each icon falls back to plain ASCII on terminals without emoji support.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");

// Artifact indicators
pub static FILE_NEW: Emoji<'_, '_> = Emoji("📄 ", "+");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "[PUB]");

// Conversation indicators
pub static SPEECH: Emoji<'_, '_> = Emoji("💬 ", ">");
pub static HOURGLASS: Emoji<'_, '_> = Emoji("⏳ ", "...");
