//! # Context Model Module / 上下文模型模块
//!
//! A context is a named node in the test tree: it holds tests, nested
//! subcontexts, and four hook kinds. Two authoring styles exist — an eager
//! tabular one classified in a single pass at construction, and a lazy
//! builder-based one expanded exactly once on first traversal — and both
//! normalize into the same traversal contract: `tests()`, `contexts()`,
//! the `get_*` hook accessors, and `full_name()`.
//!
//! 上下文是测试树中的命名节点：持有测试、嵌套子上下文和四种钩子。
//! 支持两种编写风格——构造时一次性分类的急切表格式，
//! 以及首次遍历时恰好展开一次的惰性构建式——
//! 两者归一到同一套遍历契约。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

use thiserror::Error;

use crate::core::awaitable::{Awaitable, Completion};
use crate::core::models::LogLevel;

/// Raised when a context is constructed with an empty name.
/// 以空名称构造上下文时抛出。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("context name must be a non-empty string, got {got:?}")]
pub struct NameError {
    pub got: String,
}

/// Raised when an entry has the wrong shape for its key.
/// 条目形状与其键不匹配时抛出。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid content for entry {key:?}: {reason}")]
pub struct ContentError {
    pub key: String,
    pub reason: String,
}

impl ContentError {
    fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// A construction-time misuse. Fatal: the suite does not start.
/// 构造期误用。致命错误：套件不会启动。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error(transparent)]
    Name(#[from] NameError),
    #[error(transparent)]
    Content(#[from] ContentError),
}

/// The four hook kinds a context can bind.
/// 上下文可绑定的四种钩子。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookKind {
    SetUp,
    TearDown,
    GroupSetUp,
    GroupTearDown,
}

/// The entry keys the eager classification pass recognizes as hooks (plus
/// the support-declaration key). An explicit immutable value passed at
/// construction; the instance value takes precedence over
/// [`HookNames::default`], and is consulted during classification rather
/// than cached ahead of it.
///
/// 急切分类过程识别为钩子的条目键（外加支持声明键）。
/// 在构造时传入的显式不可变值；实例值优先于默认值，
/// 且在分类时查询而非提前缓存。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookNames {
    pub set_up: String,
    pub tear_down: String,
    pub group_set_up: String,
    pub group_tear_down: String,
    pub requires_support: String,
}

impl Default for HookNames {
    fn default() -> Self {
        Self {
            set_up: "setUp".to_string(),
            tear_down: "tearDown".to_string(),
            group_set_up: "groupSetUp".to_string(),
            group_tear_down: "groupTearDown".to_string(),
            requires_support: "requiresSupportFor".to_string(),
        }
    }
}

impl HookNames {
    /// Classifies a key as a hook kind, if it matches one.
    pub fn classify(&self, key: &str) -> Option<HookKind> {
        if key == self.set_up {
            Some(HookKind::SetUp)
        } else if key == self.tear_down {
            Some(HookKind::TearDown)
        } else if key == self.group_set_up {
            Some(HookKind::GroupSetUp)
        } else if key == self.group_tear_down {
            Some(HookKind::GroupTearDown)
        } else {
            None
        }
    }

    pub fn is_support_key(&self, key: &str) -> bool {
        key == self.requires_support
    }
}

/// The key/value record a context owns. Group hooks write through to their
/// context's record; per-test overlays shadow it without mutating it.
/// 上下文拥有的键值记录。组钩子直接写入其上下文的记录；
/// 每个测试的覆盖层只遮蔽而不修改它。
pub type Record = HashMap<String, Value>;

/// The execution environment handed to hooks and test bodies: a fresh
/// per-test overlay on top of the ancestor contexts' records, outermost
/// first, inner layers shadowing outer ones. Writes land in the overlay,
/// so a hook's side effects are visible to its own test but never to
/// sibling tests.
///
/// 交给钩子和测试主体的执行环境：祖先上下文记录之上的全新测试级覆盖层，
/// 由外到内，内层遮蔽外层。写入只落在覆盖层，
/// 因此钩子的副作用对自身测试可见，但绝不会泄漏给兄弟测试。
pub struct TestEnv {
    layers: Vec<Rc<RefCell<Record>>>,
    local: Record,
    log: Vec<(LogLevel, String)>,
}

impl TestEnv {
    pub(crate) fn layered(layers: Vec<Rc<RefCell<Record>>>) -> Self {
        Self::with_local(layers, Record::new())
    }

    pub(crate) fn with_local(layers: Vec<Rc<RefCell<Record>>>, local: Record) -> Self {
        Self {
            layers,
            local,
            log: Vec::new(),
        }
    }

    /// Stores a value in the test-local overlay.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.local.insert(key.into(), value);
    }

    /// Looks a key up: the local overlay first, then the ancestor layers
    /// innermost-first.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.local.get(key) {
            return Some(value.clone());
        }
        for layer in self.layers.iter().rev() {
            if let Some(value) = layer.borrow().get(key) {
                return Some(value.clone());
            }
        }
        None
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Queues a message for the `log` event stream.
    /// 将消息排入 `log` 事件流。
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.log.push((level, message.into()));
    }

    pub(crate) fn drain_log(&mut self) -> Vec<(LogLevel, String)> {
        std::mem::take(&mut self.log)
    }

    pub(crate) fn into_local(self) -> Record {
        self.local
    }
}

/// How a body signals asynchrony — declared at registration by choosing
/// the [`TestBody`] variant, never inferred at run time.
/// 主体如何声明异步——在注册时通过选择 [`TestBody`] 变体声明，
/// 绝不在运行时推断。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncStyle {
    Sync,
    Callback,
    Awaitable,
}

/// The body of a hook or test, with its declared async capability.
pub enum TestBody {
    /// Completes when the call returns; a panic is captured immediately.
    Sync(Box<dyn Fn(&mut TestEnv)>),
    /// Completes when the [`Completion`] handle is invoked.
    Callback(Box<dyn Fn(&mut TestEnv, Completion)>),
    /// Completes when the returned awaitable settles.
    Awaited(Box<dyn Fn(&mut TestEnv) -> Awaitable<()>>),
}

impl TestBody {
    pub fn sync(f: impl Fn(&mut TestEnv) + 'static) -> Self {
        TestBody::Sync(Box::new(f))
    }

    pub fn callback(f: impl Fn(&mut TestEnv, Completion) + 'static) -> Self {
        TestBody::Callback(Box::new(f))
    }

    pub fn awaited(f: impl Fn(&mut TestEnv) -> Awaitable<()> + 'static) -> Self {
        TestBody::Awaited(Box::new(f))
    }

    pub fn style(&self) -> AsyncStyle {
        match self {
            TestBody::Sync(_) => AsyncStyle::Sync,
            TestBody::Callback(_) => AsyncStyle::Callback,
            TestBody::Awaited(_) => AsyncStyle::Awaitable,
        }
    }
}

impl fmt::Debug for TestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TestBody::{:?}", self.style())
    }
}

/// A function bound to one context.
#[derive(Debug)]
pub struct Hook {
    pub kind: HookKind,
    pub body: TestBody,
}

impl Hook {
    pub fn new(kind: HookKind, body: TestBody) -> Self {
        Self { kind, body }
    }
}

/// A named test owned by exactly one context. A missing body marks the
/// test as deferred: its hooks never run and it only ever emits
/// `test:deferred`.
///
/// 恰好属于一个上下文的命名测试。缺少主体即为挂起测试：
/// 其钩子不会运行，只会发出 `test:deferred`。
pub struct TestFunction {
    name: String,
    body: Option<Rc<TestBody>>,
    parent: RefCell<Weak<Context>>,
}

impl TestFunction {
    fn new(name: String, body: Option<Rc<TestBody>>) -> Rc<Self> {
        Rc::new(Self {
            name,
            body,
            parent: RefCell::new(Weak::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_deferred(&self) -> bool {
        self.body.is_none()
    }

    pub fn body(&self) -> Option<Rc<TestBody>> {
        self.body.clone()
    }

    /// The owning context, while it is alive.
    pub fn parent(&self) -> Option<Rc<Context>> {
        self.parent.borrow().upgrade()
    }

    /// Ancestor context names and the test's own name, space-joined.
    /// 祖先上下文名称与测试自身名称，以空格连接。
    pub fn full_name(&self) -> String {
        match self.parent() {
            Some(parent) => format!("{} {}", parent.full_name(), self.name),
            None => self.name.clone(),
        }
    }

    pub(crate) fn set_parent(&self, parent: &Rc<Context>) {
        *self.parent.borrow_mut() = Rc::downgrade(parent);
    }

    /// A re-parentable copy sharing the same body, for filtered trees.
    pub(crate) fn duplicate(&self) -> Rc<TestFunction> {
        TestFunction::new(self.name.clone(), self.body.clone())
    }
}

impl fmt::Debug for TestFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestFunction")
            .field("name", &self.name)
            .field("deferred", &self.is_deferred())
            .finish_non_exhaustive()
    }
}

/// One entry of the eager tabular authoring style.
/// 急切表格式编写风格中的一个条目。
pub enum Entry {
    /// A function entry: a test, or a hook when the key matches a
    /// configured hook name.
    Body(TestBody),
    /// A test declared without a body.
    Deferred,
    /// A nested subcontext table.
    Group(Vec<(String, Entry)>),
    /// Environment-support declarations: `(label, satisfied)` pairs.
    Support(Vec<(String, bool)>),
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Body(body) => write!(f, "Entry::Body({:?})", body.style()),
            Entry::Deferred => write!(f, "Entry::Deferred"),
            Entry::Group(entries) => write!(f, "Entry::Group({} entries)", entries.len()),
            Entry::Support(list) => write!(f, "Entry::Support({} labels)", list.len()),
        }
    }
}

/// The tagged output of the single classification pass.
enum Classified {
    Hook(HookKind, TestBody),
    Test(String, TestBody),
    DeferredTest(String),
    Subgroup(String, Vec<(String, Entry)>),
    Support(Vec<(String, bool)>),
}

/// Classifies every entry exactly once, by runtime shape and by whether
/// its key equals a configured hook name.
fn classify_entries(
    entries: Vec<(String, Entry)>,
    names: &HookNames,
) -> Result<Vec<Classified>, DefinitionError> {
    let mut classified = Vec::with_capacity(entries.len());
    let mut seen_keys: HashSet<String> = HashSet::new();
    for (key, entry) in entries {
        if !seen_keys.insert(key.clone()) {
            return Err(ContentError::new(key, "duplicate entry key").into());
        }
        if let Some(kind) = names.classify(&key) {
            match entry {
                Entry::Body(body) => classified.push(Classified::Hook(kind, body)),
                other => {
                    return Err(ContentError::new(
                        key,
                        format!("hook entry must be a function, got {other:?}"),
                    )
                    .into());
                }
            }
            continue;
        }
        if names.is_support_key(&key) {
            match entry {
                Entry::Support(list) => classified.push(Classified::Support(list)),
                other => {
                    return Err(ContentError::new(
                        key,
                        format!("support entry must be a label list, got {other:?}"),
                    )
                    .into());
                }
            }
            continue;
        }
        match entry {
            Entry::Body(body) => {
                if key.trim().is_empty() {
                    return Err(ContentError::new(key, "test name must not be empty").into());
                }
                classified.push(Classified::Test(key, body));
            }
            Entry::Deferred => {
                if key.trim().is_empty() {
                    return Err(ContentError::new(key, "test name must not be empty").into());
                }
                classified.push(Classified::DeferredTest(key));
            }
            Entry::Group(entries) => classified.push(Classified::Subgroup(key, entries)),
            Entry::Support(_) => {
                return Err(ContentError::new(
                    key,
                    format!(
                        "support declarations must use the {:?} key",
                        names.requires_support
                    ),
                )
                .into());
            }
        }
    }
    Ok(classified)
}

/// The four hook slots of a built context.
#[derive(Default, Clone)]
pub(crate) struct HookSet {
    set_up: Option<Rc<Hook>>,
    tear_down: Option<Rc<Hook>>,
    group_set_up: Option<Rc<Hook>>,
    group_tear_down: Option<Rc<Hook>>,
}

impl HookSet {
    fn slot(&mut self, kind: HookKind) -> &mut Option<Rc<Hook>> {
        match kind {
            HookKind::SetUp => &mut self.set_up,
            HookKind::TearDown => &mut self.tear_down,
            HookKind::GroupSetUp => &mut self.group_set_up,
            HookKind::GroupTearDown => &mut self.group_tear_down,
        }
    }

    fn set(&mut self, kind: HookKind, hook: Rc<Hook>) -> Result<(), ContentError> {
        let slot = self.slot(kind);
        if slot.is_some() {
            return Err(ContentError::new(
                format!("{kind:?}"),
                "a context binds at most one hook of each kind",
            ));
        }
        *slot = Some(hook);
        Ok(())
    }

    pub(crate) fn get(&self, kind: HookKind) -> Option<Rc<Hook>> {
        match kind {
            HookKind::SetUp => self.set_up.clone(),
            HookKind::TearDown => self.tear_down.clone(),
            HookKind::GroupSetUp => self.group_set_up.clone(),
            HookKind::GroupTearDown => self.group_tear_down.clone(),
        }
    }
}

/// The populated form of a context: tests and subcontexts in registration
/// order, hook slots, and unsatisfied support labels.
struct Built {
    tests: Vec<Rc<TestFunction>>,
    contexts: Vec<Rc<Context>>,
    hooks: HookSet,
    unsupported: Vec<String>,
}

/// The lazy variant's explicit build state: the builder callback runs at
/// most once, `Building` guards re-entrant calls, and repeated traversal
/// reuses the cached `Built`.
/// 惰性变体的显式构建状态：构建回调至多运行一次，
/// `Building` 防止重入，重复遍历复用缓存结果。
enum BuildState {
    Unbuilt(Box<dyn FnOnce(&mut GroupBuilder)>),
    Building,
    Built(Built),
}

/// A named node of the test tree. The tree owns its children; the parent
/// link is a non-owning back-reference used only for name composition and
/// hook-chain walking.
///
/// 测试树中的命名节点。树拥有其子节点；父链接是非拥有的反向引用，
/// 仅用于名称组合与钩子链遍历。
pub struct Context {
    name: String,
    parent: RefCell<Weak<Context>>,
    hook_names: HookNames,
    data: Rc<RefCell<Record>>,
    state: RefCell<BuildState>,
}

impl Context {
    /// Builds a context eagerly from a flat entry table, classifying every
    /// entry once, with the default hook names.
    pub fn from_entries(
        name: impl Into<String>,
        entries: Vec<(String, Entry)>,
    ) -> Result<Rc<Self>, DefinitionError> {
        Self::from_entries_with(name, entries, HookNames::default())
    }

    /// Builds a context eagerly with instance-level hook names. Subgroups
    /// inherit the same names.
    /// 以实例级钩子名称急切构建上下文。子组继承同样的名称。
    pub fn from_entries_with(
        name: impl Into<String>,
        entries: Vec<(String, Entry)>,
        hook_names: HookNames,
    ) -> Result<Rc<Self>, DefinitionError> {
        let name = validate_name(name.into())?;
        let classified = classify_entries(entries, &hook_names)?;

        let mut hooks = HookSet::default();
        let mut tests = Vec::new();
        let mut contexts = Vec::new();
        let mut unsupported = Vec::new();
        for item in classified {
            match item {
                Classified::Hook(kind, body) => {
                    hooks.set(kind, Rc::new(Hook::new(kind, body)))?;
                }
                Classified::Test(test_name, body) => {
                    tests.push(TestFunction::new(test_name, Some(Rc::new(body))));
                }
                Classified::DeferredTest(test_name) => {
                    tests.push(TestFunction::new(test_name, None));
                }
                Classified::Subgroup(group_name, group_entries) => {
                    contexts.push(Self::from_entries_with(
                        group_name,
                        group_entries,
                        hook_names.clone(),
                    )?);
                }
                Classified::Support(list) => {
                    unsupported.extend(
                        list.into_iter()
                            .filter(|(_, satisfied)| !satisfied)
                            .map(|(label, _)| label),
                    );
                }
            }
        }

        Ok(Self::assemble(
            name,
            hook_names,
            Built {
                tests,
                contexts,
                hooks,
                unsupported,
            },
        ))
    }

    /// Creates a lazy context whose builder callback runs on first
    /// traversal, with the default hook names.
    pub fn lazy(
        name: impl Into<String>,
        builder: impl FnOnce(&mut GroupBuilder) + 'static,
    ) -> Result<Rc<Self>, DefinitionError> {
        Self::lazy_with(name, builder, HookNames::default())
    }

    /// Creates a lazy context with instance-level hook names.
    pub fn lazy_with(
        name: impl Into<String>,
        builder: impl FnOnce(&mut GroupBuilder) + 'static,
        hook_names: HookNames,
    ) -> Result<Rc<Self>, DefinitionError> {
        let name = validate_name(name.into())?;
        Ok(Rc::new(Self {
            name,
            parent: RefCell::new(Weak::new()),
            hook_names,
            data: Rc::new(RefCell::new(Record::new())),
            state: RefCell::new(BuildState::Unbuilt(Box::new(builder))),
        }))
    }

    /// Assembles an already-populated context and adopts its children.
    fn assemble(name: String, hook_names: HookNames, built: Built) -> Rc<Self> {
        let context = Rc::new(Self {
            name,
            parent: RefCell::new(Weak::new()),
            hook_names,
            data: Rc::new(RefCell::new(Record::new())),
            state: RefCell::new(BuildState::Built(built)),
        });
        context.adopt_children();
        context
    }

    /// Re-assembles a filtered copy: hooks are shared unchanged, tests are
    /// re-parented duplicates, subcontexts are already-filtered nodes.
    pub(crate) fn from_filtered_parts(
        name: String,
        hook_names: HookNames,
        hooks: HookSet,
        tests: Vec<Rc<TestFunction>>,
        contexts: Vec<Rc<Context>>,
        unsupported: Vec<String>,
    ) -> Rc<Self> {
        Self::assemble(
            name,
            hook_names,
            Built {
                tests,
                contexts,
                hooks,
                unsupported,
            },
        )
    }

    fn adopt_children(self: &Rc<Self>) {
        let state = self.state.borrow();
        if let BuildState::Built(built) = &*state {
            for test in &built.tests {
                test.set_parent(self);
            }
            for child in &built.contexts {
                child.set_parent(self);
            }
        }
    }

    /// Runs the lazy builder if it has not run yet. Idempotent: repeated
    /// calls (and repeated traversal) reuse the cached result. Observing
    /// the `Building` state means the builder re-entered its own context,
    /// which is a content error.
    ///
    /// 若惰性构建器尚未运行则运行之。幂等：重复调用复用缓存结果。
    /// 观察到 `Building` 状态说明构建器重入了自己的上下文，属内容错误。
    pub fn ensure_built(self: &Rc<Self>) -> Result<(), DefinitionError> {
        match &*self.state.borrow() {
            BuildState::Built(_) => return Ok(()),
            BuildState::Building => {
                return Err(ContentError::new(
                    self.name.clone(),
                    "re-entrant context build",
                )
                .into());
            }
            BuildState::Unbuilt(_) => {}
        }

        let taken = self.state.replace(BuildState::Building);
        let BuildState::Unbuilt(builder) = taken else {
            unreachable!("state checked above");
        };
        let mut group = GroupBuilder::new(self.hook_names.clone());
        builder(&mut group);
        let built = group.finish()?;
        self.state.replace(BuildState::Built(built));
        self.adopt_children();
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<Rc<Context>> {
        self.parent.borrow().upgrade()
    }

    pub fn hook_names(&self) -> &HookNames {
        &self.hook_names
    }

    /// The context's own record layer, written by its group hooks.
    pub(crate) fn data(&self) -> Rc<RefCell<Record>> {
        self.data.clone()
    }

    /// Ancestor names and the context's own name, space-joined; a root
    /// carries no prefix.
    pub fn full_name(&self) -> String {
        match self.parent() {
            Some(parent) => format!("{} {}", parent.full_name(), self.name),
            None => self.name.clone(),
        }
    }

    /// The context's tests, in registration order; stable across calls.
    ///
    /// # Panics
    /// Panics if the deferred build fails; call [`Context::ensure_built`]
    /// first for the fallible path.
    pub fn tests(self: &Rc<Self>) -> Vec<Rc<TestFunction>> {
        self.built(|built| built.tests.clone())
    }

    /// The context's subcontexts, in declaration order; stable across
    /// calls.
    pub fn contexts(self: &Rc<Self>) -> Vec<Rc<Context>> {
        self.built(|built| built.contexts.clone())
    }

    pub fn get_set_up(self: &Rc<Self>) -> Option<Rc<Hook>> {
        self.built(|built| built.hooks.get(HookKind::SetUp))
    }

    pub fn get_tear_down(self: &Rc<Self>) -> Option<Rc<Hook>> {
        self.built(|built| built.hooks.get(HookKind::TearDown))
    }

    pub fn get_group_set_up(self: &Rc<Self>) -> Option<Rc<Hook>> {
        self.built(|built| built.hooks.get(HookKind::GroupSetUp))
    }

    pub fn get_group_tear_down(self: &Rc<Self>) -> Option<Rc<Hook>> {
        self.built(|built| built.hooks.get(HookKind::GroupTearDown))
    }

    /// Labels of support requirements the current environment does not
    /// satisfy. Non-empty means the context is skipped wholesale.
    /// 当前环境不满足的支持需求标签。非空意味着整个上下文被跳过。
    pub fn unsupported(self: &Rc<Self>) -> Vec<String> {
        self.built(|built| built.unsupported.clone())
    }

    pub(crate) fn hook_set(self: &Rc<Self>) -> HookSet {
        self.built(|built| built.hooks.clone())
    }

    fn built<R>(self: &Rc<Self>, f: impl FnOnce(&Built) -> R) -> R {
        self.ensure_built().expect("context definition error");
        match &*self.state.borrow() {
            BuildState::Built(built) => f(built),
            _ => unreachable!("ensure_built succeeded"),
        }
    }

    fn set_parent(&self, parent: &Rc<Context>) {
        *self.parent.borrow_mut() = Rc::downgrade(parent);
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.state.borrow() {
            BuildState::Unbuilt(_) => "unbuilt",
            BuildState::Building => "building",
            BuildState::Built(_) => "built",
        };
        f.debug_struct("Context")
            .field("name", &self.name)
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

fn validate_name(name: String) -> Result<String, NameError> {
    if name.trim().is_empty() {
        return Err(NameError { got: name });
    }
    Ok(name)
}

/// The registration surface handed to a lazy context's builder callback.
/// Registration order is preserved; nested groups become lazy child
/// contexts built on their own first traversal.
///
/// 交给惰性上下文构建回调的注册接口。保留注册顺序；
/// 嵌套组成为在各自首次遍历时构建的惰性子上下文。
pub struct GroupBuilder {
    hook_names: HookNames,
    hooks: HookSet,
    tests: Vec<Rc<TestFunction>>,
    contexts: Vec<Rc<Context>>,
    unsupported: Vec<String>,
    error: Option<DefinitionError>,
}

impl GroupBuilder {
    fn new(hook_names: HookNames) -> Self {
        Self {
            hook_names,
            hooks: HookSet::default(),
            tests: Vec::new(),
            contexts: Vec::new(),
            unsupported: Vec::new(),
            error: None,
        }
    }

    pub fn set_up(&mut self, body: TestBody) {
        self.register_hook(HookKind::SetUp, body);
    }

    pub fn tear_down(&mut self, body: TestBody) {
        self.register_hook(HookKind::TearDown, body);
    }

    pub fn group_set_up(&mut self, body: TestBody) {
        self.register_hook(HookKind::GroupSetUp, body);
    }

    pub fn group_tear_down(&mut self, body: TestBody) {
        self.register_hook(HookKind::GroupTearDown, body);
    }

    /// Registers a synchronous test.
    pub fn test(&mut self, name: impl Into<String>, f: impl Fn(&mut TestEnv) + 'static) {
        self.test_with(name, TestBody::sync(f));
    }

    /// Registers a test with an explicitly declared async style.
    pub fn test_with(&mut self, name: impl Into<String>, body: TestBody) {
        self.register_test(name.into(), Some(Rc::new(body)));
    }

    /// Registers a test without a body.
    pub fn deferred(&mut self, name: impl Into<String>) {
        self.register_test(name.into(), None);
    }

    /// Declares a nested group. Its builder runs when the child is first
    /// traversed; an invalid child name surfaces now, at build time.
    pub fn group(&mut self, name: impl Into<String>, builder: impl FnOnce(&mut GroupBuilder) + 'static) {
        match Context::lazy_with(name, builder, self.hook_names.clone()) {
            Ok(child) => self.contexts.push(child),
            Err(error) => self.record_error(error),
        }
    }

    /// Declares an environment-support requirement.
    pub fn require_support(&mut self, label: impl Into<String>, satisfied: bool) {
        if !satisfied {
            self.unsupported.push(label.into());
        }
    }

    fn register_hook(&mut self, kind: HookKind, body: TestBody) {
        if let Err(error) = self.hooks.set(kind, Rc::new(Hook::new(kind, body))) {
            self.record_error(error.into());
        }
    }

    fn register_test(&mut self, name: String, body: Option<Rc<TestBody>>) {
        if name.trim().is_empty() {
            self.record_error(ContentError::new(name, "test name must not be empty").into());
            return;
        }
        self.tests.push(TestFunction::new(name, body));
    }

    fn record_error(&mut self, error: DefinitionError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn finish(self) -> Result<Built, DefinitionError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(Built {
            tests: self.tests,
            contexts: self.contexts,
            hooks: self.hooks,
            unsupported: self.unsupported,
        })
    }
}
