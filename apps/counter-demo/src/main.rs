//! A page with one stateful counter, mounted into the in-memory host and
//! pumped with the std runtime. Clicks are dispatched straight at the
//! host node, the way a real binding's event loop would.

use weft_core::{
    create_element, use_state, Element, ElementKind, HostAdapter, MemoryHost, PropValue, Props,
    Renderer,
};
use weft_runtime_std::Driver;

fn counter(_props: &Props) -> Element {
    let (count, set_count) = use_state(1i64);
    create_element(
        ElementKind::host("h1"),
        Props::new()
            .attr("style", "user-select: none")
            .on("click", move || set_count.update(|n| n + 1)),
        [Element::text(format!("Count: {count}"))],
    )
}

fn app(props: &Props) -> Element {
    let name = match props.attrs.get("name") {
        Some(PropValue::Text(name)) => name.clone(),
        _ => String::new(),
    };
    create_element(
        ElementKind::host("div"),
        Props::new(),
        [
            create_element(
                ElementKind::host("h1"),
                Props::new().attr("title", "foo"),
                [Element::text(name)],
            ),
            create_element(
                ElementKind::Component(counter),
                Props::new(),
                Vec::<Element>::new(),
            ),
        ],
    )
}

fn main() {
    env_logger::init();

    let driver = Driver::new();
    let mut host = MemoryHost::new();
    let container = host
        .create_node(&ElementKind::host("root"))
        .expect("container");
    let mut renderer = Renderer::with_scheduler(host, driver.scheduler());

    let page = create_element(
        ElementKind::Component(app),
        Props::new().attr("name", "foo"),
        Vec::<Element>::new(),
    );
    renderer.render(page, container);
    if let Err(err) = driver.pump_until_idle(&mut renderer) {
        log::error!("initial render failed: {err}");
        return;
    }
    println!("mounted:\n{}", renderer.host().dump_tree(Some(container)));

    // the counter's heading is the second child of the app's div
    let div = renderer.host().children(container).expect("children")[0];
    let heading = renderer.host().children(div).expect("children")[1];

    for click in 1..=3 {
        renderer
            .host()
            .dispatch(heading, "click")
            .expect("dispatch");
        if let Err(err) = driver.pump_until_idle(&mut renderer) {
            log::error!("re-render failed: {err}");
            return;
        }
        println!(
            "after click {click}:\n{}",
            renderer.host().dump_tree(Some(container))
        );
    }
}
