//! Poly entities and their keyed proxy nodes.
//!
//! A poly entity hosts several independent nodes, each bound under a
//! [`ProxyKey`]. A proxy node stands in for its poly owner wherever a node's
//! host matters (spatial lookups, diagnostics). A poly entity may also
//! proxy itself under a self key.

use crate::engine::{Engine, EngineError};
use crate::id::{EntityId, GraphProto, ProxyKey};
use crate::node::{GraphNode, PolyNode, ProxyNode};

impl Engine {
    /// Give `entity` poly capability. With `self_key`, the entity (which must
    /// already be a node) is bound as its own proxy under that key.
    pub fn make_poly(&mut self, entity: EntityId, self_key: Option<&str>) -> Result<(), EngineError> {
        if !self.store.entities.contains_key(entity) {
            return Err(EngineError::EntityNotFound(entity));
        }
        if self.store.polys.contains_key(entity) {
            return Err(EngineError::AlreadyPoly(entity));
        }
        let mut poly = PolyNode::default();
        if let Some(key) = self_key {
            if !self.store.nodes.contains_key(entity) {
                return Err(EngineError::NotANode(entity));
            }
            if self.store.proxies.contains_key(entity) {
                return Err(EngineError::AlreadyProxy(entity));
            }
            let key = ProxyKey::from(key);
            poly.proxies.insert(key.clone(), entity);
            poly.self_key = Some(key.clone());
            self.store.proxies.insert(entity, ProxyNode { poly: entity, key });
        }
        self.store.polys.insert(entity, poly);
        Ok(())
    }

    pub fn is_poly(&self, entity: EntityId) -> bool {
        self.store.polys.contains_key(entity)
    }

    /// Bind `proxy` to `poly` under `key`. Returns `false` (and changes
    /// nothing) if the key is taken, `poly` is not poly-capable, or `proxy`
    /// already proxies for something.
    pub fn attach_proxy(&mut self, poly: EntityId, key: impl Into<ProxyKey>, proxy: EntityId) -> bool {
        let key = key.into();
        if !self.store.entities.contains_key(proxy) || self.store.proxies.contains_key(proxy) {
            return false;
        }
        let Some(record) = self.store.polys.get_mut(poly) else {
            return false;
        };
        if record.proxies.contains_key(&key) {
            return false;
        }
        record.proxies.insert(key.clone(), proxy);
        self.store.proxies.insert(proxy, ProxyNode { poly, key });
        true
    }

    /// Spawn a fresh entity with node status and attach it to `poly` under
    /// `key`. The entity is removed again if attaching fails.
    pub fn spawn_proxy_node(
        &mut self,
        poly: EntityId,
        key: impl Into<ProxyKey>,
        proto: impl Into<GraphProto>,
    ) -> Option<EntityId> {
        let key = key.into();
        let prototype = match self.store.entities.get(poly) {
            Some(meta) => format!("{}#{key}", meta.prototype),
            None => return None,
        };
        let proxy = self.store.entities.insert(crate::node::EntityMeta { prototype });
        self.store.nodes.insert(proxy, GraphNode::new(proto.into()));
        if !self.attach_proxy(poly, key, proxy) {
            self.teardown_entity(proxy);
            return None;
        }
        self.queue_edge_update(proxy);
        Some(proxy)
    }

    /// Unbind the proxy under `key`. A missing key is a silent `None`.
    pub fn detach_proxy(&mut self, poly: EntityId, key: &ProxyKey) -> Option<EntityId> {
        let record = self.store.polys.get_mut(poly)?;
        let proxy = record.proxies.remove(key)?;
        if record.self_key.as_ref() == Some(key) {
            record.self_key = None;
        }
        if self
            .store
            .proxies
            .get(proxy)
            .is_some_and(|link| link.poly == poly)
        {
            self.store.proxies.remove(proxy);
        }
        Some(proxy)
    }

    /// The entity hosting `node`: its poly owner for proxies, itself otherwise.
    pub fn node_host(&self, node: EntityId) -> EntityId {
        self.store.proxies.get(node).map_or(node, |link| link.poly)
    }

    /// The poly owner and key `proxy` is bound under.
    pub fn proxy_for(&self, proxy: EntityId) -> Option<(EntityId, &ProxyKey)> {
        self.store.proxies.get(proxy).map(|link| (link.poly, &link.key))
    }

    /// The proxy bound to `poly` under `key`.
    pub fn proxy(&self, poly: EntityId, key: &ProxyKey) -> Option<EntityId> {
        self.store.polys.get(poly)?.proxies.get(key).copied()
    }
}
