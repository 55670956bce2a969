//! Route rules mapping request paths to caching behavior.
//!
//! Rules are kept in declaration order and matched first-match-wins, so a
//! broader pattern later in the table never shadows an earlier one.

use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{ApiRouteConfig, DynamicRouteConfig};

/// A named caching policy governing network/cache consultation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
  NetworkFirst,
  CacheFirst,
  StaleWhileRevalidate,
}

/// Path pattern for a route rule.
#[derive(Debug, Clone)]
pub enum RoutePattern {
  /// Matches when the path starts with the given prefix.
  Prefix(String),
  /// Matches when the (unanchored) regex finds a match in the path.
  Pattern(Regex),
}

impl RoutePattern {
  pub fn matches(&self, path: &str) -> bool {
    match self {
      RoutePattern::Prefix(prefix) => path.starts_with(prefix.as_str()),
      RoutePattern::Pattern(regex) => regex.is_match(path),
    }
  }
}

/// An API endpoint cached with an explicit strategy and max age.
#[derive(Debug, Clone)]
pub struct ApiRoute {
  pub pattern: RoutePattern,
  pub strategy: Strategy,
  pub max_age: Duration,
}

/// A dynamic page route with a precached offline substitute.
#[derive(Debug, Clone)]
pub struct DynamicRoute {
  pub prefix: String,
  /// Asset URL of the substitute content in the offline store.
  pub offline_asset: String,
}

/// A single route rule; the table is an ordered list of these.
#[derive(Debug, Clone)]
pub enum RouteRule {
  Api(ApiRoute),
  Dynamic(DynamicRoute),
}

/// Ordered route table, first match wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
  rules: Vec<RouteRule>,
}

impl RouteTable {
  /// Build the table from configuration, compiling regex patterns.
  ///
  /// API rules come first so strategy dispatch never falls through to a
  /// dynamic rule covering the same path.
  pub fn from_config(api: &[ApiRouteConfig], dynamic: &[DynamicRouteConfig]) -> Result<Self> {
    let mut rules = Vec::with_capacity(api.len() + dynamic.len());

    for route in api {
      let pattern = if route.regex {
        let compiled = Regex::new(&route.pattern)
          .map_err(|e| eyre!("Invalid route pattern '{}': {}", route.pattern, e))?;
        RoutePattern::Pattern(compiled)
      } else {
        RoutePattern::Prefix(route.pattern.clone())
      };

      rules.push(RouteRule::Api(ApiRoute {
        pattern,
        strategy: route.strategy,
        max_age: Duration::seconds(route.max_age_secs as i64),
      }));
    }

    for route in dynamic {
      rules.push(RouteRule::Dynamic(DynamicRoute {
        prefix: route.route.clone(),
        offline_asset: route.offline.clone(),
      }));
    }

    Ok(Self { rules })
  }

  /// First API rule matching the given path.
  pub fn api_rule(&self, path: &str) -> Option<&ApiRoute> {
    self.rules.iter().find_map(|rule| match rule {
      RouteRule::Api(api) if api.pattern.matches(path) => Some(api),
      _ => None,
    })
  }

  /// Offline substitute asset for the first dynamic rule matching the path.
  pub fn offline_fallback(&self, path: &str) -> Option<&str> {
    self.rules.iter().find_map(|rule| match rule {
      RouteRule::Dynamic(dynamic) if path.starts_with(dynamic.prefix.as_str()) => {
        Some(dynamic.offline_asset.as_str())
      }
      _ => None,
    })
  }

  /// All offline substitute assets, for install-time precaching.
  pub fn dynamic_assets(&self) -> impl Iterator<Item = &str> {
    self.rules.iter().filter_map(|rule| match rule {
      RouteRule::Dynamic(dynamic) => Some(dynamic.offline_asset.as_str()),
      _ => None,
    })
  }
}
