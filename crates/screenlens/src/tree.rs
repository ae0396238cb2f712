//! Spatial UI-tree construction.
//!
//! Classified elements are composed into a containment tree: larger boxes
//! are placed first and every later element is attached to the smallest
//! already-placed box that contains it. Detected layout structures with
//! geometry are materialized as container elements so they can parent the
//! words inside them.

use crate::types::{
    screen_region, Bbox, Element, ElementSource, ElementType, IdAllocator, ScreenDimensions,
    Structures, Subtree,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Build the element tree and detect subtrees.
pub fn build_tree(
    mut elements: Vec<Element>,
    structures: &Structures,
    dims: ScreenDimensions,
    ids: &mut IdAllocator,
) -> (Vec<Element>, Vec<Subtree>) {
    elements.extend(materialize_structures(structures, dims, ids));

    // Area-descending insertion order; ties broken by id for determinism.
    elements.sort_by(|a, b| {
        b.bbox
            .area()
            .partial_cmp(&a.bbox.area())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    link_parents(&mut elements);
    repair_cycles(&mut elements);
    fill_child_ids(&mut elements);

    for element in &mut elements {
        element.screen_region = screen_region(element.normalized_bbox);
    }

    let subtrees = detect_subtrees(&elements, ids);
    (elements, subtrees)
}

/// Turn structures that carry geometry into container elements.
fn materialize_structures(
    structures: &Structures,
    dims: ScreenDimensions,
    ids: &mut IdAllocator,
) -> Vec<Element> {
    let mut out = Vec::new();
    let mut push = |element_type: ElementType, text: String, bbox: Bbox| {
        let normalized_bbox = bbox.normalize(dims);
        out.push(Element {
            id: ids.next_element(),
            element_type,
            text,
            bbox,
            normalized_bbox,
            clickable: false,
            interactive: false,
            visible: true,
            confidence: 0.8,
            detection_confidence: 0.8,
            ocr_confidence: 0.0,
            parent_id: None,
            child_ids: Vec::new(),
            screen_region: screen_region(normalized_bbox),
            attributes: Default::default(),
            source: ElementSource::Layout,
        });
    };

    for table in &structures.tables {
        if let Some(bbox) = table.bbox {
            push(ElementType::Table, String::new(), bbox);
        }
    }
    for navbar in &structures.navbars {
        if let Some(bbox) = navbar.bbox {
            push(ElementType::Container, navbar.items.join(" "), bbox);
        }
    }
    for list in &structures.lists {
        if let Some(bbox) = list.bbox {
            push(ElementType::List, String::new(), bbox);
        }
    }
    for form in &structures.forms {
        if let Some(bbox) = form.bbox {
            push(ElementType::Form, String::new(), bbox);
        }
    }
    for grid in &structures.grids {
        if let Some(bbox) = grid.bbox {
            push(ElementType::Container, grid.kind.clone(), bbox);
        }
    }
    out
}

/// Attach each element to the smallest already-placed element whose bbox
/// contains it. Elements without a container stay roots. Zero bboxes never
/// participate.
fn link_parents(elements: &mut [Element]) {
    for i in 0..elements.len() {
        if !elements[i].bbox.is_valid() {
            continue;
        }
        let child_bbox = elements[i].bbox;
        let mut best: Option<usize> = None;
        for j in 0..i {
            if !elements[j].bbox.is_valid() {
                continue;
            }
            let candidate = elements[j].bbox;
            if !candidate.contains(&child_bbox) || candidate == child_bbox {
                continue;
            }
            best = match best {
                Some(prev) if elements[prev].bbox.area() <= candidate.area() => Some(prev),
                _ => Some(j),
            };
        }
        if let Some(parent) = best {
            elements[i].parent_id = Some(elements[parent].id.clone());
        }
    }
}

/// A parent chain that re-enters itself gets its entry point re-parented to
/// root. Cannot happen for trees built here (parents always precede
/// children), but ids may arrive pre-linked from a persisted screen.
fn repair_cycles(elements: &mut [Element]) {
    let index_of: HashMap<String, usize> = elements
        .iter()
        .enumerate()
        .map(|(i, e)| (e.id.clone(), i))
        .collect();

    let mut to_root: Vec<usize> = Vec::new();
    for (start, element) in elements.iter().enumerate() {
        let mut visited = HashSet::from([start]);
        let mut current = element.parent_id.as_deref();
        while let Some(parent_id) = current {
            let Some(&parent_index) = index_of.get(parent_id) else {
                debug!(parent_id, "dangling parent reference, re-parenting to root");
                to_root.push(start);
                break;
            };
            if !visited.insert(parent_index) {
                warn!(element = %element.id, "cycle in parent chain, re-parenting to root");
                to_root.push(start);
                break;
            }
            current = elements[parent_index].parent_id.as_deref();
        }
    }
    for index in to_root {
        elements[index].parent_id = None;
    }
}

fn fill_child_ids(elements: &mut [Element]) {
    let mut children: HashMap<String, Vec<String>> = HashMap::new();
    for element in elements.iter() {
        if let Some(parent_id) = &element.parent_id {
            children
                .entry(parent_id.clone())
                .or_default()
                .push(element.id.clone());
        }
    }
    for element in elements.iter_mut() {
        element.child_ids = children.remove(&element.id).unwrap_or_default();
    }
}

/// Emit a subtree for every container-role element that spatially contains
/// at least two other elements.
fn detect_subtrees(elements: &[Element], ids: &mut IdAllocator) -> Vec<Subtree> {
    let mut subtrees = Vec::new();
    for container in elements {
        if !container.element_type.is_container() || !container.bbox.is_valid() {
            continue;
        }
        let mut contained: Vec<&Element> = elements
            .iter()
            .filter(|e| {
                e.id != container.id
                    && e.bbox.is_valid()
                    && container.bbox.contains(&e.bbox)
            })
            .collect();
        if contained.len() < 2 {
            continue;
        }
        contained.sort_by(|a, b| {
            a.bbox
                .y1
                .partial_cmp(&b.bbox.y1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        let title = if container.text.trim().is_empty() {
            contained[0].text.clone()
        } else {
            container.text.clone()
        };

        let mut element_ids = vec![container.id.clone()];
        element_ids.extend(contained.iter().map(|e| e.id.clone()));

        subtrees.push(Subtree {
            id: ids.next_subtree(),
            subtree_type: container.element_type,
            title,
            root_element_id: container.id.clone(),
            element_ids,
            bbox: container.bbox,
            description: String::new(),
        });
    }
    subtrees
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Word;
    use crate::classify::{build_element, classify_word};
    use crate::config::Config;

    fn element(id: &str, element_type: ElementType, bbox: [f64; 4]) -> Element {
        let dims = ScreenDimensions::new(1000, 1000);
        let word = Word {
            text: format!("text-{id}"),
            bbox: Bbox::from(bbox),
            confidence: 0.9,
        };
        let c = classify_word(&word, Some(dims), &Config::default());
        let mut e = build_element(&word, &c, id.to_string());
        e.element_type = element_type;
        e
    }

    fn build(elements: Vec<Element>) -> (Vec<Element>, Vec<Subtree>) {
        let mut ids = IdAllocator::new(1_700_000_000_000);
        build_tree(
            elements,
            &Structures::default(),
            ScreenDimensions::new(1000, 1000),
            &mut ids,
        )
    }

    fn by_id<'a>(elements: &'a [Element], id: &str) -> &'a Element {
        elements.iter().find(|e| e.id == id).unwrap()
    }

    #[test]
    fn smallest_container_wins() {
        let (elements, _) = build(vec![
            element("outer", ElementType::Container, [0.0, 0.0, 500.0, 500.0]),
            element("inner", ElementType::Section, [10.0, 10.0, 300.0, 300.0]),
            element("leaf", ElementType::Text, [20.0, 20.0, 100.0, 40.0]),
        ]);
        assert_eq!(by_id(&elements, "leaf").parent_id.as_deref(), Some("inner"));
        assert_eq!(
            by_id(&elements, "inner").parent_id.as_deref(),
            Some("outer")
        );
        assert_eq!(by_id(&elements, "outer").parent_id, None);
    }

    #[test]
    fn child_ids_mirror_parent_links() {
        let (elements, _) = build(vec![
            element("outer", ElementType::Container, [0.0, 0.0, 500.0, 500.0]),
            element("a", ElementType::Text, [10.0, 10.0, 100.0, 30.0]),
            element("b", ElementType::Text, [10.0, 50.0, 100.0, 70.0]),
        ]);
        let outer = by_id(&elements, "outer");
        assert_eq!(outer.child_ids.len(), 2);
        assert!(outer.child_ids.contains(&"a".to_string()));
        assert!(outer.child_ids.contains(&"b".to_string()));
    }

    #[test]
    fn disjoint_elements_are_roots() {
        let (elements, _) = build(vec![
            element("a", ElementType::Text, [0.0, 0.0, 100.0, 30.0]),
            element("b", ElementType::Text, [500.0, 500.0, 600.0, 530.0]),
        ]);
        assert!(elements.iter().all(|e| e.parent_id.is_none()));
    }

    #[test]
    fn zero_bbox_elements_stay_roots() {
        let (elements, _) = build(vec![
            element("outer", ElementType::Container, [0.0, 0.0, 999.0, 999.0]),
            element("ghost", ElementType::Text, [0.0, 0.0, 0.0, 0.0]),
        ]);
        assert_eq!(by_id(&elements, "ghost").parent_id, None);
    }

    #[test]
    fn containment_invariant_holds() {
        let (elements, _) = build(vec![
            element("outer", ElementType::Container, [0.0, 0.0, 500.0, 500.0]),
            element("inner", ElementType::Section, [10.0, 10.0, 300.0, 300.0]),
            element("leaf", ElementType::Text, [20.0, 20.0, 100.0, 40.0]),
            element("stray", ElementType::Text, [600.0, 600.0, 700.0, 640.0]),
        ]);
        for e in &elements {
            if let Some(parent_id) = &e.parent_id {
                let parent = by_id(&elements, parent_id);
                assert!(parent.bbox.contains(&e.bbox));
            }
        }
    }

    #[test]
    fn parent_graph_is_acyclic() {
        let (elements, _) = build(vec![
            element("a", ElementType::Container, [0.0, 0.0, 900.0, 900.0]),
            element("b", ElementType::Container, [10.0, 10.0, 800.0, 800.0]),
            element("c", ElementType::Container, [20.0, 20.0, 700.0, 700.0]),
            element("d", ElementType::Text, [30.0, 30.0, 100.0, 60.0]),
        ]);
        for start in &elements {
            let mut seen = std::collections::HashSet::new();
            let mut current = start.parent_id.as_deref();
            while let Some(id) = current {
                assert!(seen.insert(id.to_string()), "cycle at {id}");
                current = by_id(&elements, id).parent_id.as_deref();
            }
        }
    }

    #[test]
    fn cycle_in_prelinked_input_is_repaired() {
        let mut a = element("a", ElementType::Text, [0.0, 0.0, 100.0, 30.0]);
        let mut b = element("b", ElementType::Text, [500.0, 0.0, 600.0, 30.0]);
        a.parent_id = Some("b".to_string());
        b.parent_id = Some("a".to_string());
        let (elements, _) = build(vec![a, b]);
        let cyclic = elements.iter().filter(|e| e.parent_id.is_some()).count();
        assert_eq!(cyclic, 0);
    }

    #[test]
    fn dangling_parent_reference_is_cleared() {
        let mut a = element("a", ElementType::Text, [0.0, 0.0, 100.0, 30.0]);
        a.parent_id = Some("gone".to_string());
        let (elements, _) = build(vec![a]);
        assert_eq!(by_id(&elements, "a").parent_id, None);
    }

    #[test]
    fn container_with_two_children_becomes_subtree() {
        let (_, subtrees) = build(vec![
            element("dialog", ElementType::Dialog, [100.0, 100.0, 500.0, 400.0]),
            element("msg", ElementType::Text, [120.0, 140.0, 400.0, 170.0]),
            element("ok", ElementType::Button, [120.0, 300.0, 220.0, 340.0]),
        ]);
        assert_eq!(subtrees.len(), 1);
        let st = &subtrees[0];
        assert_eq!(st.subtree_type, ElementType::Dialog);
        assert_eq!(st.root_element_id, "dialog");
        assert_eq!(st.element_ids.len(), 3);
        assert!(st.element_ids.contains(&st.root_element_id));
        assert_eq!(st.bbox, Bbox::new(100.0, 100.0, 500.0, 400.0));
    }

    #[test]
    fn subtree_title_falls_back_to_topmost_child() {
        let mut dialog = element("dialog", ElementType::Dialog, [100.0, 100.0, 500.0, 400.0]);
        dialog.text = String::new();
        let (_, subtrees) = build(vec![
            dialog,
            element("title", ElementType::Heading, [120.0, 110.0, 400.0, 140.0]),
            element("ok", ElementType::Button, [120.0, 300.0, 220.0, 340.0]),
        ]);
        assert_eq!(subtrees[0].title, "text-title");
    }

    #[test]
    fn container_with_one_child_is_not_a_subtree() {
        let (_, subtrees) = build(vec![
            element("dialog", ElementType::Dialog, [100.0, 100.0, 500.0, 400.0]),
            element("only", ElementType::Text, [120.0, 140.0, 400.0, 170.0]),
        ]);
        assert!(subtrees.is_empty());
    }

    #[test]
    fn structures_with_geometry_materialize_as_elements() {
        use crate::types::{NavbarPosition, NavbarStructure};
        let structures = Structures {
            navbars: vec![NavbarStructure {
                line: 0,
                items: vec!["home".into(), "about".into(), "contact".into()],
                position: NavbarPosition::Top,
                bbox: Some(Bbox::new(0.0, 0.0, 900.0, 40.0)),
            }],
            ..Default::default()
        };
        let mut ids = IdAllocator::new(1_700_000_000_000);
        let (elements, _) = build_tree(
            vec![
                element("home", ElementType::MenuItem, [10.0, 5.0, 80.0, 30.0]),
                element("about", ElementType::MenuItem, [100.0, 5.0, 180.0, 30.0]),
            ],
            &structures,
            ScreenDimensions::new(1000, 1000),
            &mut ids,
        );
        let navbar = elements
            .iter()
            .find(|e| e.source == ElementSource::Layout)
            .unwrap();
        assert_eq!(navbar.element_type, ElementType::Container);
        assert_eq!(by_id(&elements, "home").parent_id.as_deref(), Some(navbar.id.as_str()));
    }

    #[test]
    fn ids_never_collide_across_captures() {
        let mut first = IdAllocator::new(1_700_000_000_000);
        let mut second = IdAllocator::new(1_700_000_000_000);
        let a: std::collections::HashSet<String> =
            (0..50).map(|_| first.next_element()).collect();
        let b: std::collections::HashSet<String> =
            (0..50).map(|_| second.next_element()).collect();
        assert!(a.is_disjoint(&b));
    }
}
