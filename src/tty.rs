use crate::config::ColorMode;
use is_terminal::IsTerminal;

/// Check if stderr is connected to a TTY
pub fn is_stderr_tty() -> bool {
    std::io::stderr().is_terminal()
}

/// Determine if diagnostics should be coloured based on the colour mode and environment
pub fn should_use_colors_with_mode(color_mode: &ColorMode) -> bool {
    match color_mode {
        ColorMode::Never => false,
        // Even with Always, respect NO_COLOR
        ColorMode::Always => std::env::var_os("NO_COLOR").is_none(),
        ColorMode::Auto => should_use_colors_auto(),
    }
}

/// Emoji prefixes only make sense on an interactive stderr
pub fn should_use_emoji_for_stderr() -> bool {
    is_stderr_tty() && std::env::var_os("NO_EMOJI").is_none()
}

fn should_use_colors_auto() -> bool {
    // Respect NO_COLOR (https://no-color.org/)
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }

    // CI environments that render colour set FORCE_COLOR
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }

    is_stderr_tty()
}
