//! A small scene exercising the public API end to end: a tree, a
//! subscription, a resource declared and fetched, then a few paced frames.

use std::any::Any;
use std::sync::Arc;

use hearth::engine::EntityContext;
use hearth::{Engine, EntityDefinition};
use hearth_util::debug::error::ErrorFormatExt;

struct Greeter {
	remaining_frames: u32,
}

fn on_init(_: &mut dyn Any, ctx: &mut EntityContext<'_>) {
	log::info!("entity {:?} initialized", ctx.handle());
}

fn on_frame(payload: &mut dyn Any, ctx: &mut EntityContext<'_>, elapsed_ms: f32) {
	let greeter = payload.downcast_mut::<Greeter>().unwrap();
	log::info!("frame tick, {:.2}ms elapsed, {} frames left", elapsed_ms, greeter.remaining_frames);

	if greeter.remaining_frames == 0 {
		ctx.quit();
		return;
	}
	greeter.remaining_frames -= 1;
	ctx.stack_event("greet", false, b"hello from the frame loop".to_vec());
}

fn on_greet(_: &mut dyn Any, _: &mut EntityContext<'_>, payload: &[u8]) {
	log::info!("greet received: {}", String::from_utf8_lossy(payload));
}

fn main() {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let demo_resource = std::env::temp_dir().join("hearth-demo-resource.txt");
	if let Err(err) = std::fs::write(&demo_resource, b"demo bundle contents") {
		log::error!("could not write demo resource fixture: {err}");
		return;
	}

	let mut engine = Engine::new();

	let greeter_def = Arc::new(EntityDefinition::new::<Greeter>().with_on_init(on_init).with_on_frame(on_frame));
	let greeter = engine
		.root_entity()
		.add_child("greeter", greeter_def, Greeter { remaining_frames: 3 })
		.expect("root is always alive");

	engine.entity(greeter).queue_subscribe("greet", 0, on_greet);
	engine.step(0.0); // apply the subscribe command before frames start publishing

	match engine.declare_resource("demo", demo_resource.to_str().unwrap()) {
		Ok(_) => {
			if let Some((bytes, size)) = engine.entity(greeter).fetch_resource("demo", demo_resource.to_str().unwrap()) {
				log::info!("fetched {size} bytes: {}", String::from_utf8_lossy(&bytes));
			}
		}
		Err(err) => err.log(),
	}

	engine.run(30);

	let _ = std::fs::remove_file(&demo_resource);
}
