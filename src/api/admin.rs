use crate::api::{status_for, ContentTypeHeader};
use crate::db::{CalendarOperations, TableOperations};
use crate::enums::admin::{
    CapacityRequest, HoursRequest, InvalidationResponse, TableListResponse, TableResponse,
};
use crate::models::floor::{NewDiningTable, OpeningHours};
use actix_web::middleware::NormalizePath;
use actix_web::{get, post, put, web, HttpResponse, Responder};
use chrono::NaiveDate;
use log::{error, info};
use utoipa_actix_web::{scope, service_config::ServiceConfig};

pub(super) fn config(
    cfg: &mut ServiceConfig,
    table_ops: &TableOperations,
    calendar_ops: &CalendarOperations,
) {
    cfg.service(
        scope::scope("/admin")
            .wrap(NormalizePath::trim())
            .app_data(web::Data::new(table_ops.clone()))
            .app_data(web::Data::new(calendar_ops.clone()))
            .service(
                scope::scope("")
                    .guard(ContentTypeHeader)
                    .service(add_table)
                    .service(update_table_capacity)
                    .service(set_opening_hours),
            )
            .service(list_tables)
            .service(disable_table),
    );
}

#[utoipa::path(
    tag = "Admin",
    request_body = NewDiningTable,
    responses(
        (status = 200, description = "Table added", body = TableResponse),
        (status = 400, description = "Invalid capacity", body = TableResponse)
    ),
    summary = "Add a table to the floor"
)]
#[post("/tables")]
pub(super) async fn add_table(
    table_ops: web::Data<TableOperations>,
    req_data: web::Json<NewDiningTable>,
) -> actix_web::Result<impl Responder> {
    let new_table = req_data.into_inner();
    let number = new_table.table_number;
    let result = web::block(move || table_ops.add_table(new_table)).await?;

    match result {
        Ok(table) => {
            info!("add_table: table {} seats {}", table.table_number, table.capacity);
            Ok(HttpResponse::Ok().json(TableResponse::ok(
                format!("Table {} added", table.table_number),
                table,
            )))
        }
        Err(e) => {
            error!("add_table: failed for table number {}: {}", number, e);
            Ok(HttpResponse::build(status_for(&e)).json(TableResponse::error("Table not added", e)))
        }
    }
}

#[utoipa::path(
    tag = "Admin",
    responses(
        (status = 200, description = "Every table, active or not, by table number", body = TableListResponse)
    ),
    summary = "List the floor"
)]
#[get("/tables")]
pub(super) async fn list_tables(
    table_ops: web::Data<TableOperations>,
) -> actix_web::Result<impl Responder> {
    let result = web::block(move || table_ops.list_tables()).await?;

    match result {
        Ok(tables) => Ok(HttpResponse::Ok().json(TableListResponse::ok(
            format!("{} tables", tables.len()),
            tables,
        ))),
        Err(e) => {
            error!("list_tables: {}", e);
            Ok(HttpResponse::build(status_for(&e))
                .json(TableListResponse::error("Tables unavailable", e)))
        }
    }
}

#[utoipa::path(
    tag = "Admin",
    params(("id", description = "Table ID")),
    request_body = CapacityRequest,
    responses(
        (status = 200, description = "Capacity changed; lists reservations cancelled as a result", body = InvalidationResponse),
        (status = 404, description = "Unknown table", body = InvalidationResponse)
    ),
    summary = "Change a table's capacity"
)]
#[put("/tables/{id}/capacity")]
pub(super) async fn update_table_capacity(
    table_ops: web::Data<TableOperations>,
    path: web::Path<(i32,)>,
    req_data: web::Json<CapacityRequest>,
) -> actix_web::Result<impl Responder> {
    let table_id = path.into_inner().0;
    let capacity = req_data.into_inner().capacity;
    let result = web::block(move || table_ops.update_table_capacity(table_id, capacity)).await?;

    match result {
        Ok(cancelled) => Ok(HttpResponse::Ok().json(InvalidationResponse::ok(
            format!(
                "Table {} capacity set to {}; {} reservations cancelled",
                table_id,
                capacity,
                cancelled.len()
            ),
            cancelled,
        ))),
        Err(e) => {
            error!("update_table_capacity: failed for table {}: {}", table_id, e);
            Ok(HttpResponse::build(status_for(&e))
                .json(InvalidationResponse::error("Capacity not changed", e)))
        }
    }
}

#[utoipa::path(
    tag = "Admin",
    params(("id", description = "Table ID")),
    responses(
        (status = 200, description = "Table disabled; lists reservations cancelled as a result", body = InvalidationResponse),
        (status = 404, description = "Unknown table", body = InvalidationResponse)
    ),
    summary = "Take a table out of service"
)]
#[post("/tables/{id}/disable")]
pub(super) async fn disable_table(
    table_ops: web::Data<TableOperations>,
    path: web::Path<(i32,)>,
) -> actix_web::Result<impl Responder> {
    let table_id = path.into_inner().0;
    let result = web::block(move || table_ops.disable_table(table_id)).await?;

    match result {
        Ok(cancelled) => Ok(HttpResponse::Ok().json(InvalidationResponse::ok(
            format!(
                "Table {} disabled; {} reservations cancelled",
                table_id,
                cancelled.len()
            ),
            cancelled,
        ))),
        Err(e) => {
            error!("disable_table: failed for table {}: {}", table_id, e);
            Ok(HttpResponse::build(status_for(&e))
                .json(InvalidationResponse::error("Table not disabled", e)))
        }
    }
}

#[utoipa::path(
    tag = "Admin",
    params(("date", description = "Calendar date, YYYY-MM-DD")),
    request_body = HoursRequest,
    responses(
        (status = 200, description = "Hours saved; lists reservations cancelled as a result", body = InvalidationResponse)
    ),
    summary = "Set the opening hours of one date"
)]
#[put("/hours/{date}")]
pub(super) async fn set_opening_hours(
    calendar_ops: web::Data<CalendarOperations>,
    path: web::Path<(NaiveDate,)>,
    req_data: web::Json<HoursRequest>,
) -> actix_web::Result<impl Responder> {
    let hours_date = path.into_inner().0;
    let HoursRequest {
        open_time,
        close_time,
        occasion,
    } = req_data.into_inner();
    let hours = OpeningHours {
        hours_date,
        open_time,
        close_time,
        occasion,
    };
    let result = web::block(move || calendar_ops.set_opening_hours(hours)).await?;

    match result {
        Ok(cancelled) => Ok(HttpResponse::Ok().json(InvalidationResponse::ok(
            format!(
                "Hours for {} saved; {} reservations cancelled",
                hours_date,
                cancelled.len()
            ),
            cancelled,
        ))),
        Err(e) => {
            error!("set_opening_hours: failed for {}: {}", hours_date, e);
            Ok(HttpResponse::build(status_for(&e))
                .json(InvalidationResponse::error("Hours not saved", e)))
        }
    }
}
