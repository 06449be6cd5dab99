//! Infrastructure wiring: event store, bus, dispatcher, projections.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use uuid::Uuid;

use telar_core::{Aggregate, AggregateId, DomainError};
use telar_events::{EventBus, EventEnvelope, InMemoryEventBus};
use telar_infra::{
    CommandDispatcher, InMemoryEventStore, InMemoryKeyedStore,
    command_dispatcher::DispatchError,
    event_store::{EventStore, StoredEvent},
    projections::{
        accounts::{AccountRow, AccountsProjection},
        catalogs::CatalogsProjection,
        journal::{AccountBalanceRow, JournalEntryRow, JournalProjection},
        locations::{LocationRow, LocationsProjection},
        materials::{MaterialRow, MaterialsProjection},
        movements::{MovementRow, MovementsProjection},
        parties::{CustomerRow, CustomersProjection, SupplierRow, SuppliersProjection},
        purchases::{PurchaseOrderRow, PurchasesProjection},
        sales::{SaleRow, SalesProjection},
        stock::{StockProjection, StockRow},
        users::{RoleRow, RolesProjection, UserRow, UsersProjection},
    },
};

/// Aggregate type tags (stream routing keys).
pub mod aggregate_types {
    pub const USER: &str = "auth.user";
    pub const ROLE: &str = "auth.role";
    pub const MATERIAL: &str = "materials.material";
    pub const MATERIAL_CATALOG: &str = "materials.catalog";
    pub const SUPPLIER: &str = "parties.supplier";
    pub const CUSTOMER: &str = "parties.customer";
    pub const TRADE_CATALOG: &str = "parties.catalog";
    pub const LOCATION: &str = "inventory.location";
    pub const STOCK: &str = "inventory.stock";
    pub const PURCHASE_ORDER: &str = "purchasing.order";
    pub const SALE_ORDER: &str = "sales.order";
    pub const JOURNAL: &str = "accounting.journal";
    pub const ACCOUNT: &str = "accounting.account";
    pub const ACCOUNT_CATALOG: &str = "accounting.catalog";
}

type Store<K, V> = Arc<InMemoryKeyedStore<K, V>>;
type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Bus>;

pub type StockProj = StockProjection<Store<(String, String), StockRow>>;
pub type MovementsProj = MovementsProjection<Store<Uuid, MovementRow>>;
pub type MaterialsProj = MaterialsProjection<Store<String, MaterialRow>>;
pub type SuppliersProj = SuppliersProjection<Store<String, SupplierRow>>;
pub type CustomersProj = CustomersProjection<Store<String, CustomerRow>>;
pub type LocationsProj = LocationsProjection<Store<String, LocationRow>>;
pub type PurchasesProj = PurchasesProjection<Store<String, PurchaseOrderRow>>;
pub type SalesProj = SalesProjection<Store<String, SaleRow>>;
pub type JournalProj =
    JournalProjection<Store<Uuid, JournalEntryRow>, Store<String, AccountBalanceRow>>;
pub type AccountsProj = AccountsProjection<Store<String, AccountRow>>;
pub type UsersProj = UsersProjection<Store<String, UserRow>>;
pub type RolesProj = RolesProjection<Store<String, RoleRow>>;

/// Everything the handlers need: the dispatcher plus every read model.
pub struct AppServices {
    dispatcher: Arc<Dispatcher>,
    event_store: Arc<InMemoryEventStore>,

    pub stock: Arc<StockProj>,
    pub movements: Arc<MovementsProj>,
    pub materials: Arc<MaterialsProj>,
    pub suppliers: Arc<SuppliersProj>,
    pub customers: Arc<CustomersProj>,
    pub locations: Arc<LocationsProj>,
    pub purchases: Arc<PurchasesProj>,
    pub sales: Arc<SalesProj>,
    pub journal: Arc<JournalProj>,
    pub accounts: Arc<AccountsProj>,
    pub users: Arc<UsersProj>,
    pub roles: Arc<RolesProj>,
    pub catalogs: Arc<CatalogsProjection>,
}

impl AppServices {
    /// Dispatch a command through the event-sourcing pipeline.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: telar_events::Event + serde::Serialize + serde::de::DeserializeOwned,
    {
        self.dispatcher
            .dispatch::<A>(aggregate_id, aggregate_type, command, make_aggregate)
    }

    /// Strongly consistent existence check against the event store itself
    /// (used by import upsert routing and duplicate detection, where the
    /// eventually consistent read models would race).
    pub fn stream_exists(&self, aggregate_id: AggregateId) -> bool {
        self.event_store
            .load_stream(aggregate_id)
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    }
}

/// Build the in-memory wiring: store + bus + projections + background
/// subscriber feeding every projection from the bus.
pub fn build_services() -> AppServices {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());

    let stock = Arc::new(StockProj::new(Arc::new(InMemoryKeyedStore::new())));
    let movements = Arc::new(MovementsProj::new(Arc::new(InMemoryKeyedStore::new())));
    let materials = Arc::new(MaterialsProj::new(Arc::new(InMemoryKeyedStore::new())));
    let suppliers = Arc::new(SuppliersProj::new(Arc::new(InMemoryKeyedStore::new())));
    let customers = Arc::new(CustomersProj::new(Arc::new(InMemoryKeyedStore::new())));
    let locations = Arc::new(LocationsProj::new(Arc::new(InMemoryKeyedStore::new())));
    let purchases = Arc::new(PurchasesProj::new(Arc::new(InMemoryKeyedStore::new())));
    let sales = Arc::new(SalesProj::new(Arc::new(InMemoryKeyedStore::new())));
    let journal = Arc::new(JournalProj::new(
        Arc::new(InMemoryKeyedStore::new()),
        Arc::new(InMemoryKeyedStore::new()),
    ));
    let accounts = Arc::new(AccountsProj::new(Arc::new(InMemoryKeyedStore::new())));
    let users = Arc::new(UsersProj::new(Arc::new(InMemoryKeyedStore::new())));
    let roles = Arc::new(RolesProj::new(Arc::new(InMemoryKeyedStore::new())));
    let catalogs = Arc::new(CatalogsProjection::new());

    // Background subscriber: bus -> projections, routed by aggregate type.
    {
        let sub = bus.subscribe();
        let stock = stock.clone();
        let movements = movements.clone();
        let materials = materials.clone();
        let suppliers = suppliers.clone();
        let customers = customers.clone();
        let locations = locations.clone();
        let purchases = purchases.clone();
        let sales = sales.clone();
        let journal = journal.clone();
        let accounts = accounts.clone();
        let users = users.clone();
        let roles = roles.clone();
        let catalogs = catalogs.clone();
        tokio::task::spawn_blocking(move || {
            loop {
                match sub.recv() {
                    Ok(env) => {
                        let at = env.aggregate_type();

                        let apply_ok = match at {
                            aggregate_types::STOCK => stock
                                .apply_envelope(&env)
                                .and_then(|_| movements.apply_envelope(&env))
                                .map_err(|e| e.to_string()),
                            aggregate_types::MATERIAL => {
                                materials.apply_envelope(&env).map_err(|e| e.to_string())
                            }
                            aggregate_types::SUPPLIER => {
                                suppliers.apply_envelope(&env).map_err(|e| e.to_string())
                            }
                            aggregate_types::CUSTOMER => {
                                customers.apply_envelope(&env).map_err(|e| e.to_string())
                            }
                            aggregate_types::LOCATION => {
                                locations.apply_envelope(&env).map_err(|e| e.to_string())
                            }
                            aggregate_types::PURCHASE_ORDER => {
                                purchases.apply_envelope(&env).map_err(|e| e.to_string())
                            }
                            aggregate_types::SALE_ORDER => sales
                                .apply_envelope(&env)
                                .and_then(|_| journal.apply_envelope(&env))
                                .map_err(|e| e.to_string()),
                            aggregate_types::JOURNAL => {
                                journal.apply_envelope(&env).map_err(|e| e.to_string())
                            }
                            aggregate_types::ACCOUNT => {
                                accounts.apply_envelope(&env).map_err(|e| e.to_string())
                            }
                            aggregate_types::USER => {
                                users.apply_envelope(&env).map_err(|e| e.to_string())
                            }
                            aggregate_types::ROLE => {
                                roles.apply_envelope(&env).map_err(|e| e.to_string())
                            }
                            aggregate_types::MATERIAL_CATALOG
                            | aggregate_types::TRADE_CATALOG
                            | aggregate_types::ACCOUNT_CATALOG => {
                                catalogs.apply_envelope(&env).map_err(|e| e.to_string())
                            }
                            _ => Ok(()),
                        };

                        if let Err(e) = apply_ok {
                            tracing::warn!("projection apply failed: {e}");
                        }
                    }
                    Err(_) => break,
                }
            }
        });
    }

    let dispatcher = Arc::new(CommandDispatcher::new(store.clone(), bus));

    AppServices {
        dispatcher,
        event_store: store,
        stock,
        movements,
        materials,
        suppliers,
        customers,
        locations,
        purchases,
        sales,
        journal,
        accounts,
        users,
        roles,
        catalogs,
    }
}
