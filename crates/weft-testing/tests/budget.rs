//! Budget-exhaustion resumption: a render forced to yield between units
//! converges on the same committed tree as an uninterrupted run.

use weft_core::{
    create_element, Element, ElementKind, HostAdapter, HostId, MemoryHost, Props, Renderer,
};
use weft_testing::{drain, CountedSlice};

fn new_renderer() -> (Renderer<MemoryHost>, HostId) {
    let mut host = MemoryHost::new();
    let container = host
        .create_node(&ElementKind::host("root"))
        .expect("container");
    (Renderer::new(host), container)
}

fn deep_page() -> Element {
    let items: Vec<Element> = (0..4)
        .map(|i| {
            create_element(
                ElementKind::host("li"),
                Props::new(),
                [Element::text(format!("item {i}"))],
            )
        })
        .collect();
    create_element(
        ElementKind::host("div"),
        Props::new().attr("id", "page"),
        [create_element(ElementKind::host("ul"), Props::new(), items)],
    )
}

#[test]
fn interrupted_render_matches_the_uninterrupted_result() {
    let (mut interrupted, container_a) = new_renderer();
    interrupted.render(deep_page(), container_a);

    let mut slices = 0u32;
    while interrupted.has_pending_work() {
        interrupted
            .work_loop(&CountedSlice::new(2))
            .expect("sliced work");
        slices += 1;
        assert!(slices < 100, "render never converged");
        if slices == 1 {
            // mid-flight: the commit has not happened yet
            assert!(interrupted
                .host()
                .children(container_a)
                .expect("children")
                .is_empty());
        }
    }
    assert!(slices > 2, "expected the walk to span several slices");

    let (mut oneshot, container_b) = new_renderer();
    oneshot.render(deep_page(), container_b);
    drain(&mut oneshot).expect("uninterrupted");

    assert_eq!(
        interrupted.host().dump_tree(Some(container_a)),
        oneshot.host().dump_tree(Some(container_b))
    );
}
