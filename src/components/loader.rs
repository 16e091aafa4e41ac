// Skeleton placeholders shown while the snapshot loads

use crate::dom::{el, mount, Attr, Child, ElementRef};

pub fn render_skeleton_cards(container: &ElementRef, count: usize) {
    let placeholders: Vec<Child> = (0..count)
        .map(|_| el("div", vec![Attr::class("skeleton skeleton--card")], vec![]).into())
        .collect();
    mount(
        container,
        vec![el("div", vec![Attr::class("container")], placeholders).into()],
    );
}
