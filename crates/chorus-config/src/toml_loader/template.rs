//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Chorus Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[gateway]
# url = "wss://gateway.discord.gg/?v=9&encoding=json"
# connect_timeout_secs = 15   # 1-120
# settle_delay_ms = 1500      # 0-10000
# leave_grace_ms = 300        # 0-5000

[join]
# base_delay_ms = 900         # 0-60000
# jitter_ms = 800             # 0-60000

[client]
# os = "linux"
# browser = "chorus"
# device = "chorus"

[directory]
# enabled = true
# url = "https://discord.com/api/v9/users/@me"
# timeout_secs = 10           # 1-60

[logging]
# level = "info"              # trace, debug, info, warn, error
"##
    .to_string()
}
