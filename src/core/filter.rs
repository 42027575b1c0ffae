//! # Context Filter Module / 上下文过滤模块
//!
//! A pure tree transform: select tests whose full path matches a
//! predicate, pruning every subcontext whose filtered subtree retains no
//! test. Surviving nodes share their hook references unchanged.
//!
//! 纯树变换：按完整路径谓词选择测试，
//! 剪除过滤后子树中不再含任何测试的子上下文。
//! 幸存节点原样共享其钩子引用。

use regex::{Regex, RegexBuilder};
use std::rc::Rc;

use crate::core::context::{Context, DefinitionError};

/// What a test's full path is matched against: a plain substring, a
/// regular expression, or an OR-combined list of either. All matching is
/// case-insensitive.
///
/// 用于匹配测试完整路径的谓词：普通子串、正则表达式，
/// 或二者的有序列表（按 OR 组合）。所有匹配均不区分大小写。
#[derive(Debug, Clone)]
pub enum Predicate {
    Text(String),
    Pattern(Regex),
    Any(Vec<Predicate>),
}

impl Predicate {
    pub fn text(needle: impl Into<String>) -> Self {
        Predicate::Text(needle.into())
    }

    /// Compiles a case-insensitive regular expression predicate.
    pub fn pattern(source: &str) -> Result<Self, regex::Error> {
        Ok(Predicate::Pattern(
            RegexBuilder::new(source).case_insensitive(true).build()?,
        ))
    }

    pub fn any(predicates: Vec<Predicate>) -> Self {
        Predicate::Any(predicates)
    }

    /// Whether the space-joined full path of a test matches.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Predicate::Text(needle) => path.to_lowercase().contains(&needle.to_lowercase()),
            Predicate::Pattern(regex) => regex.is_match(path),
            Predicate::Any(predicates) => predicates.iter().any(|p| p.matches(path)),
        }
    }
}

impl From<&str> for Predicate {
    fn from(needle: &str) -> Self {
        Predicate::text(needle)
    }
}

impl From<Regex> for Predicate {
    fn from(regex: Regex) -> Self {
        Predicate::Pattern(regex)
    }
}

/// Filters one context tree. With no predicate the result is an identity
/// copy. With one, a test survives if `path_prefix + context name + " " +
/// test name` matches, and a subcontext survives only if its filtered
/// subtree retains at least one test, transitively — a name match alone is
/// not enough. Non-surviving nodes are omitted, not replaced with empty
/// stand-ins.
///
/// 过滤一棵上下文树。无谓词时结果为恒等拷贝。
/// 有谓词时，测试按 `前缀 + 上下文名 + " " + 测试名` 匹配存留；
/// 子上下文仅当其过滤后的子树仍保有至少一个测试时存留——
/// 仅名称匹配并不足够。未存留的节点被省略，而非以空壳替代。
pub fn filter_context(
    context: &Rc<Context>,
    predicate: Option<&Predicate>,
    path_prefix: &str,
) -> Result<Option<Rc<Context>>, DefinitionError> {
    context.ensure_built()?;
    let own_prefix = format!("{path_prefix}{} ", context.name());

    let tests: Vec<_> = context
        .tests()
        .iter()
        .filter(|test| match predicate {
            None => true,
            Some(p) => p.matches(&format!("{own_prefix}{}", test.name())),
        })
        .map(|test| test.duplicate())
        .collect();

    let mut children = Vec::new();
    for child in context.contexts() {
        if let Some(kept) = filter_context(&child, predicate, &own_prefix)? {
            children.push(kept);
        }
    }

    if predicate.is_some() && tests.is_empty() && children.is_empty() {
        return Ok(None);
    }

    Ok(Some(Context::from_filtered_parts(
        context.name().to_string(),
        context.hook_names().clone(),
        context.hook_set(),
        tests,
        children,
        context.unsupported(),
    )))
}
