//! Metamodel mutation events and the bus that carries them

use tokio::sync::broadcast;

use super::model::{
    AttributePk, DimensionPk, DomainPk, MetamodelObject, MetricPk, ProjectPk, RelationPk,
};

/// Default number of buffered events per subscriber
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Project,
    Domain,
    Dimension,
    Attribute,
    Metric,
    Relation,
    Job,
    State,
    Session,
}

impl ObjectType {
    /// Ephemeral objects never feed cached computations.
    #[must_use]
    pub const fn is_ephemeral(self) -> bool {
        matches!(self, Self::Job | Self::State | Self::Session)
    }
}

/// Identity of the mutated object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectRef {
    Project(ProjectPk),
    Domain(DomainPk),
    Dimension(DimensionPk),
    Attribute(AttributePk),
    Metric(MetricPk),
    Relation(RelationPk),
    Job(String),
    State(String),
    Session(String),
}

impl ObjectRef {
    #[must_use]
    pub const fn object_type(&self) -> ObjectType {
        match self {
            Self::Project(_) => ObjectType::Project,
            Self::Domain(_) => ObjectType::Domain,
            Self::Dimension(_) => ObjectType::Dimension,
            Self::Attribute(_) => ObjectType::Attribute,
            Self::Metric(_) => ObjectType::Metric,
            Self::Relation(_) => ObjectType::Relation,
            Self::Job(_) => ObjectType::Job,
            Self::State(_) => ObjectType::State,
            Self::Session(_) => ObjectType::Session,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

/// Where an event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EventOrigin {
    #[default]
    Local,
    /// Forwarded from another node
    Remote,
    /// Loopback of an already processed event
    Echo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationEvent {
    pub object: ObjectRef,
    pub kind: MutationKind,
    pub previous: Option<MetamodelObject>,
    pub current: Option<MetamodelObject>,
    pub origin: EventOrigin,
}

impl MutationEvent {
    pub const fn new(object: ObjectRef, kind: MutationKind) -> Self {
        Self {
            object,
            kind,
            previous: None,
            current: None,
            origin: EventOrigin::Local,
        }
    }

    #[must_use]
    pub fn with_previous(mut self, previous: MetamodelObject) -> Self {
        self.previous = Some(previous);
        self
    }

    #[must_use]
    pub fn with_current(mut self, current: MetamodelObject) -> Self {
        self.current = Some(current);
        self
    }

    #[must_use]
    pub const fn with_origin(mut self, origin: EventOrigin) -> Self {
        self.origin = origin;
        self
    }

    #[must_use]
    pub const fn object_type(&self) -> ObjectType {
        self.object.object_type()
    }

    /// Whether the event can be ignored for cache invalidation.
    #[must_use]
    pub const fn is_cache_irrelevant(&self) -> bool {
        matches!(self.origin, EventOrigin::Echo) || self.object_type().is_ephemeral()
    }

    /// Snapshots in the event, newest first.
    pub fn snapshots(&self) -> impl Iterator<Item = &MetamodelObject> {
        self.current.iter().chain(self.previous.iter())
    }
}

/// Fan-out channel from the metamodel store to invalidation consumers.
///
/// Publishing never blocks; a consumer that falls more than the bus capacity
/// behind loses the oldest events and is told how many it missed.
#[derive(Debug, Clone)]
pub struct MutationBus {
    sender: broadcast::Sender<MutationEvent>,
}

impl Default for MutationBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl MutationBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish `event`; returns the number of subscribers it reached.
    pub fn publish(&self, event: MutationEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::debug!("Mutation event published with no subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MutationEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain_event() -> MutationEvent {
        MutationEvent::new(
            ObjectRef::Domain(ProjectPk::new("p").domain("d")),
            MutationKind::Update,
        )
    }

    #[test]
    fn test_echo_is_irrelevant() {
        let event = domain_event().with_origin(EventOrigin::Echo);
        assert!(event.is_cache_irrelevant());
        assert!(!domain_event().is_cache_irrelevant());
        assert!(!domain_event().with_origin(EventOrigin::Remote).is_cache_irrelevant());
    }

    #[test]
    fn test_ephemeral_objects_are_irrelevant() {
        for object in [
            ObjectRef::Job("j".into()),
            ObjectRef::State("s".into()),
            ObjectRef::Session("x".into()),
        ] {
            let event = MutationEvent::new(object, MutationKind::Create);
            assert!(event.is_cache_irrelevant());
        }
    }

    #[test]
    fn test_snapshots_newest_first() {
        use crate::invalidation::model::Domain;

        let pk = ProjectPk::new("p").domain("d");
        let old = MetamodelObject::Domain(Domain { pk: pk.clone() });
        let new = MetamodelObject::Domain(Domain { pk });
        let event = domain_event()
            .with_previous(old.clone())
            .with_current(new.clone());

        let snapshots: Vec<_> = event.snapshots().collect();
        assert_eq!(snapshots, vec![&new, &old]);
    }

    #[tokio::test]
    async fn test_bus_fans_out() {
        let bus = MutationBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.publish(domain_event()), 2);
        assert_eq!(a.recv().await.unwrap(), domain_event());
        assert_eq!(b.recv().await.unwrap(), domain_event());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = MutationBus::default();
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(domain_event()), 0);
    }
}
