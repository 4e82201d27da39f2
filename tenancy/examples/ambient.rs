use fibre_tenancy::{AmbientIdentifier, LifetimeScope, MultitenantContainer};
use std::sync::Arc;
use std::thread;

struct Branding {
  colour: &'static str,
}

// Stands in for a request handler that knows nothing about tenants.
fn render_page(container: &MultitenantContainer<String, AmbientIdentifier<String>>) -> String {
  let branding = container.resolve::<Branding>().unwrap();
  format!("<body style=\"color: {}\">", branding.colour)
}

fn main() {
  let app = LifetimeScope::root(|builder| builder.add_instance(Branding { colour: "black" }));
  let container = Arc::new(MultitenantContainer::new(app, AmbientIdentifier::<String>::new()));

  container
    .configure_tenant(Some("red-corp".to_string()), |builder| {
      builder.add_instance(Branding { colour: "red" })
    })
    .unwrap();
  container
    .configure_tenant(Some("blue-corp".to_string()), |builder| {
      builder.add_instance(Branding { colour: "blue" })
    })
    .unwrap();

  // Each "request" runs on its own thread and enters its tenant once.
  let handles: Vec<_> = ["red-corp", "blue-corp", "new-corp"]
    .into_iter()
    .map(|tenant| {
      let container = container.clone();
      thread::spawn(move || {
        let _tenant = AmbientIdentifier::enter(tenant.to_string());
        println!("{:>9}: {}", tenant, render_page(&container));
      })
    })
    .collect();

  for handle in handles {
    handle.join().unwrap();
  }

  // Outside of any request the default tenant is used.
  println!("{:>9}: {}", "<default>", render_page(&container));

  container.dispose();
}
