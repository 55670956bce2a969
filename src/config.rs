//! Worker configuration.
//!
//! Everything the browser worker kept as file-scope constants — version,
//! cache-name prefix, precache list, route tables — is explicit
//! configuration here, loadable from YAML with built-in defaults matching
//! the shipped POS client.

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::routes::Strategy;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Version identifier baked into store names, e.g. "v3.1.0-nawiri-pos".
  pub version: String,
  /// Prefix shared by all versioned store names.
  pub cache_prefix: String,
  /// Origin that install-time asset paths are resolved against.
  pub origin: String,
  /// Application shell assets fetched unconditionally at install time.
  pub precache_assets: Vec<String>,
  /// Precached page served when a navigation fails.
  pub offline_page: String,
  /// Image substitute for image requests that fail entirely.
  pub placeholder_image: String,
  /// API endpoints cached with explicit strategies, in match order.
  pub api_routes: Vec<ApiRouteConfig>,
  /// Dynamic page routes with offline substitutes, in match order.
  pub dynamic_routes: Vec<DynamicRouteConfig>,
  /// Path prefixes that must never be written to a cache store.
  pub excluded_prefixes: Vec<String>,
  pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiRouteConfig {
  pub pattern: String,
  /// Treat `pattern` as a regex instead of a path prefix.
  #[serde(default)]
  pub regex: bool,
  pub strategy: Strategy,
  pub max_age_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DynamicRouteConfig {
  pub route: String,
  /// Asset URL of the offline substitute for this route.
  pub offline: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
  pub icon: String,
  pub badge: String,
}

impl Default for NotificationConfig {
  fn default() -> Self {
    Self {
      icon: "/static/images/icon-192x192.png".to_string(),
      badge: "/static/images/badge.png".to_string(),
    }
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      version: "v3.1.0-nawiri-pos".to_string(),
      cache_prefix: "nawiri-cache".to_string(),
      origin: "http://localhost:5000".to_string(),
      precache_assets: [
        "/",
        "/manifest.json",
        "/static/css/main.css",
        "/static/js/main.js",
        "/static/images/logo.svg",
        "/static/images/icon-192x192.png",
        "/static/images/icon-512x512.png",
        "/static/fonts/Inter.woff2",
        "/offline",
        "/static/offline-data.json",
      ]
      .into_iter()
      .map(String::from)
      .collect(),
      offline_page: "/offline".to_string(),
      placeholder_image: "/static/images/offline-placeholder.png".to_string(),
      api_routes: vec![
        ApiRouteConfig {
          pattern: "/api/products".to_string(),
          regex: true,
          strategy: Strategy::StaleWhileRevalidate,
          max_age_secs: 3600,
        },
        ApiRouteConfig {
          pattern: "/api/sales".to_string(),
          regex: true,
          strategy: Strategy::NetworkFirst,
          max_age_secs: 1800,
        },
        ApiRouteConfig {
          pattern: "/api/inventory".to_string(),
          regex: true,
          strategy: Strategy::CacheFirst,
          max_age_secs: 86400,
        },
      ],
      dynamic_routes: vec![
        DynamicRouteConfig {
          route: "/sales".to_string(),
          offline: "/static/offline-sales.html".to_string(),
        },
        DynamicRouteConfig {
          route: "/products".to_string(),
          offline: "/static/offline-products.json".to_string(),
        },
        DynamicRouteConfig {
          route: "/customers".to_string(),
          offline: "/static/offline-customers.json".to_string(),
        },
      ],
      excluded_prefixes: vec!["/auth/".to_string(), "/admin/".to_string()],
      notifications: NotificationConfig::default(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./nawiri-offline.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/nawiri-offline/config.yaml
  ///
  /// Falls back to the built-in defaults when no file exists.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("nawiri-offline.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("nawiri-offline").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// The configured origin as a parsed URL.
  pub fn origin_url(&self) -> Result<Url> {
    Url::parse(&self.origin).map_err(|e| eyre!("Invalid origin '{}': {}", self.origin, e))
  }
}
