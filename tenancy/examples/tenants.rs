use fibre_tenancy::{LifetimeScope, MultitenantContainer, StaticIdentifier};
use std::sync::Arc;

// 1. Define the abstraction each tenant may customize
trait PricingPolicy: Send + Sync {
  fn price(&self, base: u32) -> u32;
}

struct ListPrice;
impl PricingPolicy for ListPrice {
  fn price(&self, base: u32) -> u32 {
    base
  }
}

struct Discount(u32);
impl PricingPolicy for Discount {
  fn price(&self, base: u32) -> u32 {
    base - base * self.0 / 100
  }
}

fn main() -> fibre_tenancy::Result<()> {
  // --- Application Registrations ---
  let app = LifetimeScope::root(|builder| {
    builder.add_singleton_trait::<dyn PricingPolicy>(|_| Ok(Arc::new(ListPrice)));
  });

  // This container always serves "acme"; a real service would identify the
  // tenant from the request instead.
  let container = MultitenantContainer::new(app, StaticIdentifier::new("acme"));

  // --- First Use ---
  // "acme" was never configured, so it gets a default scope on first use.
  println!("acme pays {}", container.resolve::<dyn PricingPolicy>()?.price(100));

  // --- Configuring ---
  // Other tenants can be configured before anyone uses them.
  container.configure_tenant(Some("globex"), |builder| {
    builder.add_singleton_trait::<dyn PricingPolicy>(|_| Ok(Arc::new(Discount(10))));
  })?;
  let globex = container.tenant_scope(Some("globex"))?;
  println!("globex pays {}", globex.resolve::<dyn PricingPolicy>()?.price(100));

  // "acme" already has a scope, so configuring it again is rejected...
  let rejected = container.configure_tenant(Some("acme"), |_| {});
  println!("configuring acme again: {}", rejected.unwrap_err());

  // ...but it can be reconfigured. The old scope is disposed.
  let old = container.current_tenant_scope()?;
  container.reconfigure_tenant(Some("acme"), |builder| {
    builder.add_singleton_trait::<dyn PricingPolicy>(|_| Ok(Arc::new(Discount(25))));
  })?;
  println!(
    "acme now pays {} (old scope disposed: {})",
    container.resolve::<dyn PricingPolicy>()?.price(100),
    old.is_disposed()
  );

  // --- Teardown ---
  println!("tenants: {:?}", container.tenants());
  container.remove_tenant(Some("globex"));
  container.dispose();
  println!("globex scope disposed: {}", globex.is_disposed());

  Ok(())
}
