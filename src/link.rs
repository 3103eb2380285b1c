use std::any::{Any, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::PortError;
use crate::port::{PortId, Value, value};
use crate::task::TaskHandle;

/// What a link carries to its target input.
#[derive(Clone)]
pub enum LinkKind {
    /// Reads the live value of the source output at transfer time.
    Pull { output: PortId },
    /// Always writes the same constant, whatever the state of the source.
    Force {
        value: Value,
        type_name: &'static str,
    },
}

impl fmt::Debug for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::Pull { output } => f.debug_struct("Pull").field("output", output).finish(),
            LinkKind::Force { type_name, .. } => f
                .debug_struct("Force")
                .field("type_name", type_name)
                .finish_non_exhaustive(),
        }
    }
}

/// A directed edge from a source task to an input of a target task.
///
/// Links hold no execution state, they can be transferred any number of
/// times. Equality is edge identity: `(source, output, target, input)` for
/// pulling links, `(source, target, input)` for forcing links, so two forcing
/// links into the same input are the same edge whatever constant they carry.
#[derive(Clone)]
pub struct Link {
    source: TaskHandle,
    target: TaskHandle,
    input: PortId,
    kind: LinkKind,
}

impl Link {
    pub fn pull(
        source: &TaskHandle,
        output: impl Into<PortId>,
        target: &TaskHandle,
        input: impl Into<PortId>,
    ) -> Self {
        Self {
            source: source.clone(),
            target: target.clone(),
            input: input.into(),
            kind: LinkKind::Pull {
                output: output.into(),
            },
        }
    }

    pub fn force<T>(
        source: &TaskHandle,
        item: T,
        target: &TaskHandle,
        input: impl Into<PortId>,
    ) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            source: source.clone(),
            target: target.clone(),
            input: input.into(),
            kind: LinkKind::Force {
                value: value(item),
                type_name: type_name::<T>(),
            },
        }
    }

    pub fn source(&self) -> &TaskHandle {
        &self.source
    }

    /// The source output for a pulling link, `None` for a forcing one.
    pub fn output(&self) -> Option<&PortId> {
        match &self.kind {
            LinkKind::Pull { output } => Some(output),
            LinkKind::Force { .. } => None,
        }
    }

    pub fn target(&self) -> &TaskHandle {
        &self.target
    }

    pub fn input(&self) -> &PortId {
        &self.input
    }

    pub fn kind(&self) -> &LinkKind {
        &self.kind
    }

    pub fn is_forced(&self) -> bool {
        matches!(self.kind, LinkKind::Force { .. })
    }

    /// Whether `task` is at either end of this link.
    pub fn touches(&self, task: &TaskHandle) -> bool {
        &self.source == task || &self.target == task
    }

    /// Whether [`transfer`](Link::transfer) would find a value to write.
    pub fn is_transferable(&self) -> Result<bool, PortError> {
        match &self.kind {
            LinkKind::Pull { output } => self.source.is_set(output),
            LinkKind::Force { .. } => Ok(true),
        }
    }

    /// The value this link would transfer right now.
    pub fn value(&self) -> Result<Value, PortError> {
        match &self.kind {
            LinkKind::Pull { output } => self.source.read(output),
            LinkKind::Force { value, .. } => Ok(value.clone()),
        }
    }

    /// Copies the value to the target input.
    ///
    /// # Errors
    ///
    /// [`PortError::Unset`] when a pulling link's source output has no value.
    pub fn transfer(&self) -> Result<(), PortError> {
        // The read lock is released before the write, a link may loop back
        // onto its own source task.
        let value = self.value()?;
        self.target.write(&self.input, value)
    }
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        let same_kind = match (&self.kind, &other.kind) {
            (LinkKind::Pull { output: a }, LinkKind::Pull { output: b }) => a == b,
            (LinkKind::Force { .. }, LinkKind::Force { .. }) => true,
            _ => false,
        };

        same_kind
            && self.source == other.source
            && self.target == other.target
            && self.input == other.input
    }
}

impl Eq for Link {}

impl Hash for Link {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
        self.target.hash(state);
        self.input.hash(state);
        self.output().hash(state);
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LinkKind::Pull { output } => write!(
                f,
                "{}({}) -> {}({})",
                self.source, output, self.target, self.input
            ),
            LinkKind::Force { type_name, .. } => write!(
                f,
                "{} -> <{}> -> {}({})",
                self.source, type_name, self.target, self.input
            ),
        }
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Link({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Linear;

    fn pair() -> (TaskHandle, TaskHandle) {
        (
            TaskHandle::named("a", Linear::default()),
            TaskHandle::named("b", Linear::default()),
        )
    }

    #[test]
    fn test_pull_identity() {
        let (a, b) = pair();

        assert_eq!(
            Link::pull(&a, Linear::VALUE, &b, Linear::VALUE),
            Link::pull(&a, Linear::VALUE, &b, Linear::VALUE)
        );
        assert_ne!(
            Link::pull(&a, Linear::VALUE, &b, Linear::VALUE),
            Link::pull(&b, Linear::VALUE, &a, Linear::VALUE)
        );
    }

    #[test]
    fn test_force_identity_ignores_value() {
        let (a, b) = pair();

        assert_eq!(
            Link::force(&a, 1_i32, &b, Linear::VALUE),
            Link::force(&a, "other", &b, Linear::VALUE)
        );
        assert_ne!(
            Link::force(&a, 1_i32, &b, Linear::VALUE),
            Link::pull(&a, Linear::VALUE, &b, Linear::VALUE)
        );
    }

    #[test]
    fn test_pull_fails_while_unset() {
        let (a, b) = pair();
        let link = Link::pull(&a, Linear::VALUE, &b, Linear::VALUE);

        assert_eq!(link.is_transferable(), Ok(false));
        assert_eq!(link.transfer(), Err(PortError::Unset(Linear::VALUE)));

        a.write(&Linear::VALUE, value(3_i32)).unwrap();
        a.execute().unwrap();

        assert_eq!(link.is_transferable(), Ok(true));
        link.transfer().unwrap();
        b.execute().unwrap();
        assert_eq!(b.output::<i32>(Linear::VALUE).unwrap().get(), Ok(3));
    }

    #[test]
    fn test_force_never_depends_on_source() {
        let (a, b) = pair();
        let link = Link::force(&a, 9_i32, &b, Linear::VALUE);

        assert_eq!(link.is_transferable(), Ok(true));
        link.transfer().unwrap();
        link.transfer().unwrap();
        b.execute().unwrap();
        assert_eq!(b.output::<i32>(Linear::VALUE).unwrap().get(), Ok(9));
    }

    #[test]
    fn test_self_loop_transfer() {
        let a = TaskHandle::new(Linear::default());
        a.write(&Linear::VALUE, value(5_i32)).unwrap();
        a.execute().unwrap();

        Link::pull(&a, Linear::VALUE, &a, Linear::VALUE)
            .transfer()
            .unwrap();
    }

    #[test]
    fn test_display() {
        let (a, b) = pair();
        let link = Link::force(&a, 1_u8, &b, Linear::VALUE);
        let text = link.to_string();

        assert!(text.starts_with("a#"));
        assert!(text.contains("<u8>"));
        assert!(text.ends_with("(value)"));
    }
}
