//! Read-model row → JSON mapping for responses.

use serde_json::{Value as JsonValue, json};

use telar_infra::projections::{
    accounts::AccountRow,
    journal::{AccountBalanceRow, JournalEntryRow},
    locations::LocationRow,
    materials::MaterialRow,
    movements::MovementRow,
    parties::{CustomerRow, SupplierRow},
    purchases::PurchaseOrderRow,
    sales::SaleRow,
    stock::StockRow,
    users::{RoleRow, UserRow},
};

const TS: &str = "%Y-%m-%d %H:%M:%S";
const DAY: &str = "%Y-%m-%d";

pub fn material_to_json(row: MaterialRow) -> JsonValue {
    json!({
        "id_material": row.code,
        "name": row.name,
        "description": row.description,
        "unit": row.unit,
        "type": row.material_type,
        "status": row.active,
        "created_by": row.created_by,
        "created_at": row.created_at.format(TS).to_string(),
        "updated_at": row.updated_at.format(TS).to_string(),
    })
}

fn party_to_json(
    code: &str,
    key: &str,
    row_profile: &telar_parties::PartyProfile,
    created_by: &str,
    created_at: String,
    updated_at: String,
) -> JsonValue {
    let mut value = json!({
        "legal_name": row_profile.legal_name,
        "name": row_profile.name,
        "country": row_profile.country,
        "currency": row_profile.currency,
        "text_id": row_profile.tax_id,
        "state_province": row_profile.state_province,
        "city": row_profile.city,
        "address": row_profile.address,
        "zip_code": row_profile.zip_code,
        "phone": row_profile.phone,
        "email": row_profile.email,
        "contact_name": row_profile.contact_name,
        "contact_role": row_profile.contact_role,
        "category": row_profile.category,
        "payments_terms": row_profile.payment_terms,
        "payment_method": row_profile.payment_method,
        "bank_account": row_profile.bank_account,
        "status": row_profile.active,
        "created_by": created_by,
        "created_at": created_at,
        "updated_at": updated_at,
    });
    if let Some(map) = value.as_object_mut() {
        map.insert(key.to_string(), JsonValue::from(code));
    }
    value
}

pub fn supplier_to_json(row: SupplierRow) -> JsonValue {
    party_to_json(
        &row.code,
        "id_suplier",
        &row.profile,
        &row.created_by,
        row.created_at.format(TS).to_string(),
        row.updated_at.format(TS).to_string(),
    )
}

pub fn customer_to_json(row: CustomerRow) -> JsonValue {
    party_to_json(
        &row.code,
        "id_customer",
        &row.profile,
        &row.created_by,
        row.created_at.format(TS).to_string(),
        row.updated_at.format(TS).to_string(),
    )
}

pub fn location_to_json(row: LocationRow) -> JsonValue {
    json!({
        "code": row.code,
        "name": row.name,
        "location": row.address,
        "main_location": row.main_location,
        "status": row.active,
        "created_by": row.created_by,
        "created_at": row.created_at.format(TS).to_string(),
        "updated_at": row.updated_at.format(TS).to_string(),
    })
}

pub fn stock_to_json(row: StockRow) -> JsonValue {
    json!({
        "id_location": row.location,
        "id_material": row.material,
        "quantity": row.quantity,
        "unit_type": row.unit,
        "min_stock": row.min_stock,
        "max_stock": row.max_stock,
        "last_movement": row.last_movement.map(|t| t.format(TS).to_string()),
        "updated_at": row.updated_at.format(TS).to_string(),
    })
}

pub fn movement_to_json(row: MovementRow) -> JsonValue {
    json!({
        "id": row.movement_id,
        "id_location": row.location,
        "id_material": row.material,
        "quantity": row.quantity,
        "unit_type": row.unit,
        "movement_type": row.kind.as_str(),
        "notes": row.note,
        "created_by": row.recorded_by,
        "created_at": row.created_at.format(TS).to_string(),
    })
}

pub fn purchase_order_to_json(row: PurchaseOrderRow) -> JsonValue {
    json!({
        "id_purchase_order": row.code,
        "id_supplier": row.supplier,
        "issue_date": row.issue_date.format(DAY).to_string(),
        "estimated_delivery_date": row.estimated_delivery_date.format(DAY).to_string(),
        "status": row.status.as_str(),
        "total_amount": row.total_amount,
        "currency": row.currency,
        "notes": row.notes,
        "created_by": row.created_by,
        "created_at": row.created_at.format(TS).to_string(),
        "updated_at": row.updated_at.format(TS).to_string(),
        "lines": row.lines.iter().map(|l| json!({
            "position": l.position,
            "id_material": l.material,
            "quantity": l.quantity,
            "unit_material": l.unit,
            "price": l.unit_price,
            "currency_suppliers": l.currency,
            "resolved_quantity": l.resolved_quantity,
            "pending": l.pending(),
        })).collect::<Vec<_>>(),
    })
}

pub fn sale_to_json(row: SaleRow) -> JsonValue {
    json!({
        "id_sale_order": row.code,
        "id_customer": row.customer,
        "id_location": row.location,
        "id_material": row.material,
        "quantity": row.quantity,
        "unit": row.unit,
        "unit_price": row.unit_price,
        "subtotal": row.subtotal,
        "total_amount": row.total_amount,
        "currency": row.currency,
        "acc_debit": row.debit_account,
        "acc_credit": row.credit_account,
        "created_by": row.recorded_by,
        "created_at": row.created_at.format(TS).to_string(),
    })
}

pub fn account_to_json(row: AccountRow) -> JsonValue {
    json!({
        "id_account": row.key,
        "name": row.fields.name,
        "code": row.fields.code,
        "description": row.fields.description,
        "account_type": row.fields.account_type,
        "account_group": row.fields.account_group,
        "nature": row.fields.nature,
        "currency_id": row.fields.currency,
        "country_id": row.fields.country,
        "parent_account": row.fields.parent_account,
        "status": row.fields.active,
        "created_by": row.created_by,
        "created_at": row.created_at.format(TS).to_string(),
        "updated_at": row.updated_at.format(TS).to_string(),
    })
}

pub fn journal_entry_to_json(row: JournalEntryRow) -> JsonValue {
    json!({
        "id": row.entry_id,
        "date": row.date.format(DAY).to_string(),
        "description": row.description,
        "reference": row.reference,
        "created_by": row.recorded_by,
        "created_at": row.created_at.format(TS).to_string(),
        "items": row.lines.iter().map(|l| json!({
            "account_id": l.account,
            "debit": l.debit,
            "credit": l.credit,
        })).collect::<Vec<_>>(),
    })
}

pub fn balance_to_json(row: AccountBalanceRow) -> JsonValue {
    json!({
        "account": row.account,
        "debit_total": row.debit_total,
        "credit_total": row.credit_total,
        "balance": row.balance(),
    })
}

pub fn user_to_json(row: UserRow) -> JsonValue {
    json!({
        "username": row.username,
        "email": row.email,
        "role": row.role,
        "is_active": row.active,
        "is_superuser": row.superuser,
        "created_at": row.created_at.format(TS).to_string(),
        "updated_at": row.updated_at.format(TS).to_string(),
    })
}

pub fn role_to_json(row: RoleRow) -> JsonValue {
    let levels: serde_json::Map<String, JsonValue> = telar_auth::Module::ALL
        .iter()
        .map(|m| {
            (
                m.as_str().to_string(),
                JsonValue::from(row.permissions.level(*m).as_u8()),
            )
        })
        .collect();

    json!({
        "name": row.name,
        "description": row.description,
        "permissions": levels,
        "created_at": row.created_at.format(TS).to_string(),
        "updated_at": row.updated_at.format(TS).to_string(),
    })
}
