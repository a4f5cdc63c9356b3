//! Colour tags for replicated graphs.

use std::collections::BTreeMap;

use nodenet_core::id::{GraphId, GraphProto};
use serde::{Deserialize, Serialize};
use slotmap::Key;

use crate::filter::VisFilter;

/// An 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// How one graph type is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeStyle {
    pub color: Option<Rgb>,
    /// Whether newly enabled sessions see this type without asking.
    pub visible: bool,
}

impl Default for TypeStyle {
    fn default() -> Self {
        Self {
            color: None,
            visible: true,
        }
    }
}

/// Per-type colours and default visibility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisPalette {
    types: BTreeMap<String, TypeStyle>,
}

impl VisPalette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, proto: impl Into<String>, style: TypeStyle) {
        self.types.insert(proto.into(), style);
    }

    pub fn style(&self, proto: &str) -> Option<&TypeStyle> {
        self.types.get(proto)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The explicit colour for `proto`, else one derived from the graph
    /// handle so neighbouring graphs of one type tell apart.
    pub fn color_for(&self, graph: GraphId, proto: &GraphProto) -> Rgb {
        self.types
            .get(proto.as_str())
            .and_then(|style| style.color)
            .unwrap_or_else(|| derived_color(graph))
    }

    /// The filter a session starts with when it enables: every type
    /// except those marked hidden. Types the palette does not list stay
    /// visible.
    pub fn default_filter(&self) -> VisFilter {
        VisFilter::except(
            self.types
                .iter()
                .filter(|(_, style)| !style.visible)
                .map(|(proto, _)| proto.clone()),
        )
    }
}

/// Spread the bits of the graph handle over three bright channels.
fn derived_color(graph: GraphId) -> Rgb {
    let mut x = graph.entity().data().as_ffi();
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    x ^= x >> 33;
    let [r, g, b, ..] = x.to_le_bytes();
    Rgb::new(r | 0x40, g | 0x40, b | 0x40)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodenet_core::test_utils::spawn_ids;

    fn colored(color: Rgb) -> TypeStyle {
        TypeStyle {
            color: Some(color),
            visible: true,
        }
    }

    #[test]
    fn explicit_color_wins() {
        let ids = spawn_ids(1);
        let mut palette = VisPalette::new();
        palette.insert("pipe", colored(Rgb::new(0, 0, 255)));
        assert_eq!(
            palette.color_for(GraphId(ids[0]), &GraphProto::from("pipe")),
            Rgb::new(0, 0, 255)
        );
    }

    #[test]
    fn derived_color_is_stable_and_bright() {
        let ids = spawn_ids(2);
        let mut palette = VisPalette::new();
        palette.insert("cable", TypeStyle::default());
        let cable = GraphProto::from("cable");
        let first = palette.color_for(GraphId(ids[0]), &cable);
        assert_eq!(first, palette.color_for(GraphId(ids[0]), &cable));
        assert_ne!(first, palette.color_for(GraphId(ids[1]), &cable));
        assert!(first.r >= 0x40 && first.g >= 0x40 && first.b >= 0x40);
    }

    #[test]
    fn default_filter_skips_hidden_types() {
        let mut palette = VisPalette::new();
        palette.insert("pipe", colored(Rgb::new(1, 2, 3)));
        assert_eq!(palette.default_filter(), VisFilter::all());

        palette.insert(
            "gas",
            TypeStyle {
                color: None,
                visible: false,
            },
        );
        let filter = palette.default_filter();
        assert_eq!(filter, VisFilter::except(["gas"]));
        assert!(filter.allows_proto(&GraphProto::from("pipe")));
        assert!(!filter.allows_proto(&GraphProto::from("gas")));
        // Unlisted types keep the default of being visible.
        assert!(filter.allows_proto(&GraphProto::from("cable")));
    }
}
