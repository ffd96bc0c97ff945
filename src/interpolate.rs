//! Environment variable interpolation for message templates
//!
//! Two placeholder styles are supported so the same template works for
//! freestyle jobs and pipelines:
//! - `${env.NAME}` is replaced first, absent names become empty
//! - `${NAME}` and `$NAME` are expanded afterwards, unknown names stay literal

use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Variables of the current build, keyed by name
pub type Environment = HashMap<String, String>;

static ENV_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{env\.(.+?)\}").expect("placeholder pattern is valid")
});

static MODIFIER_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{[^}:]*:[^}]*\}").expect("placeholder pattern is valid")
});

/// Interpolate `message` against `env`.
pub fn interpolate(message: &str, env: &Environment) -> String {
    let mut result = message.to_string();

    for caps in ENV_PLACEHOLDER.captures_iter(message) {
        let name = &caps[1];
        let value = env.get(name).map(String::as_str).unwrap_or("");
        result = result.replace(&caps[0], value);
    }

    expand(&result, env)
}

/// Interpolate when an environment is available; pass through otherwise.
pub fn interpolate_opt(message: &str, env: Option<&Environment>) -> String {
    match env {
        Some(env) => interpolate(message, env),
        None => message.to_string(),
    }
}

/// Expand `${NAME}` and `$NAME`.
///
/// Braced forms carrying a modifier (`${NAME:-default}` and friends) are
/// not variables here and are copied through untouched.
fn expand(message: &str, env: &Environment) -> String {
    let mut result = String::with_capacity(message.len());
    let mut last = 0;

    for m in MODIFIER_PLACEHOLDER.find_iter(message) {
        result.push_str(&expand_plain(&message[last..m.start()], env));
        result.push_str(m.as_str());
        last = m.end();
    }
    result.push_str(&expand_plain(&message[last..], env));

    result
}

fn expand_plain(text: &str, env: &Environment) -> String {
    shellexpand::env_with_context_no_errors(text, |name: &str| {
        env.get(name).map(|v| Cow::Borrowed(v.as_str()))
    })
    .into_owned()
}
