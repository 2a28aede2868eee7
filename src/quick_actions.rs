//! Pre-defined one-click commands, keyed by environment kind.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShellError};

/// Kind used when a target declares no environment or an unknown one.
pub const FALLBACK_KIND: &str = "generic";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickAction {
    pub id: String,
    pub label: String,
    /// Raw command as transmitted; never display-formatted here.
    pub command: String,
    #[serde(default)]
    pub description: String,
}

impl QuickAction {
    fn new(id: &str, label: &str, command: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            command: command.to_string(),
            description: description.to_string(),
        }
    }
}

/// Read-only catalog of quick actions.
#[derive(Debug, Clone, Default)]
pub struct QuickActionCatalog {
    by_kind: HashMap<String, Vec<QuickAction>>,
}

impl QuickActionCatalog {
    /// Parse a catalog shaped `{ "<kind>": [ { "id", "label", "command", "description" } ] }`.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: HashMap<String, Vec<QuickAction>> = serde_json::from_str(text)?;
        Self::from_map(raw)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    fn from_map(raw: HashMap<String, Vec<QuickAction>>) -> Result<Self> {
        let mut by_kind = HashMap::with_capacity(raw.len());
        for (kind, actions) in raw {
            let kind = kind.trim().to_ascii_lowercase();
            let mut seen = HashSet::new();
            for action in &actions {
                if action.command.trim().is_empty() {
                    return Err(ShellError::InvalidConfig(format!(
                        "quick action {kind}/{} has an empty command",
                        action.id
                    )));
                }
                if !seen.insert(action.id.as_str()) {
                    return Err(ShellError::InvalidConfig(format!(
                        "duplicate quick action id {kind}/{}",
                        action.id
                    )));
                }
            }
            by_kind.insert(kind, actions);
        }
        Ok(Self { by_kind })
    }

    /// The catalog shipped with the console.
    pub fn builtin() -> Self {
        let mut by_kind = HashMap::new();
        by_kind.insert(
            "laravel".to_string(),
            vec![
                QuickAction::new(
                    "migrate",
                    "Run migrations",
                    "export PATH=/usr/local/bin:$PATH && /usr/local/bin/php8.2 artisan migrate --force",
                    "Apply outstanding database migrations",
                ),
                QuickAction::new(
                    "optimize-clear",
                    "Clear caches",
                    "export PATH=/usr/local/bin:$PATH && /usr/local/bin/php8.2 artisan optimize:clear",
                    "Flush config, route, view and application caches",
                ),
                QuickAction::new(
                    "queue-restart",
                    "Restart queue workers",
                    "/usr/local/bin/php8.2 artisan queue:restart",
                    "Signal queue workers to restart after their current job",
                ),
                QuickAction::new(
                    "composer-install",
                    "Install dependencies",
                    "export COMPOSER_HOME=/tmp/composer && /usr/local/bin/composer install --no-dev --optimize-autoloader",
                    "Install production Composer dependencies",
                ),
            ],
        );
        by_kind.insert(
            "django".to_string(),
            vec![
                QuickAction::new(
                    "migrate",
                    "Run migrations",
                    "/usr/bin/python3 manage.py migrate --noinput",
                    "Apply outstanding database migrations",
                ),
                QuickAction::new(
                    "collectstatic",
                    "Collect static files",
                    "/usr/bin/python3 manage.py collectstatic --noinput",
                    "Gather static assets into STATIC_ROOT",
                ),
                QuickAction::new(
                    "pip-install",
                    "Install dependencies",
                    "/usr/bin/pip3 install -r requirements.txt",
                    "Install packages from requirements.txt",
                ),
            ],
        );
        by_kind.insert(
            "node".to_string(),
            vec![
                QuickAction::new(
                    "npm-ci",
                    "Install dependencies",
                    "export NODE_ENV=production && /usr/local/bin/npm ci",
                    "Clean install from package-lock.json",
                ),
                QuickAction::new(
                    "npm-build",
                    "Build",
                    "/usr/local/bin/npm run build",
                    "Run the build script",
                ),
            ],
        );
        by_kind.insert(
            FALLBACK_KIND.to_string(),
            vec![
                QuickAction::new("list", "List files", "ls -la", "List the working directory"),
                QuickAction::new("disk", "Disk usage", "df -h", "Show filesystem usage"),
                QuickAction::new("uptime", "Uptime", "uptime", "Show load and uptime"),
            ],
        );
        Self { by_kind }
    }

    /// Actions offered for `kind`, falling back to the generic set.
    pub fn for_environment(&self, kind: Option<&str>) -> &[QuickAction] {
        let kind = kind.map(|k| k.trim().to_ascii_lowercase());
        kind.and_then(|k| self.by_kind.get(&k))
            .or_else(|| self.by_kind.get(FALLBACK_KIND))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn find(&self, kind: Option<&str>, id: &str) -> Option<&QuickAction> {
        self.for_environment(kind).iter().find(|a| a.id == id)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.by_kind.keys().map(String::as_str)
    }
}
