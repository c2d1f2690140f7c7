// src/docs.rs

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::projects::initialize_project,
        crate::api::products::add_product,
        crate::api::products::update_product,
        crate::api::products::delete_product,
        crate::api::products::get_products,
        crate::api::purchases::validate_item_for_purchase,
        crate::api::purchases::process_purchase,
        crate::api::purchases::check_user_purchased,
        crate::api::purchases::get_purchases,
        crate::api::subscriptions::check_user_subscribed,
        crate::api::subscriptions::cancel_subscription,
        crate::api::subscriptions::get_subscriptions,
        crate::api::analytics::get_user_summary,
        crate::api::analytics::get_project_analytics
    ),
    components(
        schemas(
            crate::api::projects::InitializeProjectRequest,
            crate::api::products::AddProductRequest,
            crate::api::products::UpdateProductRequest,
            crate::api::products::ProductRequest,
            crate::api::products::ProjectRequest,
            crate::api::purchases::UserProductRequest,
            crate::api::purchases::ProcessPurchaseRequest,
            crate::api::purchases::ListRequest,
            crate::api::analytics::UserSummaryRequest,
            crate::api::analytics::AnalyticsRequest,
            crate::validation::CardData,
            crate::validation::PaypalData,
            crate::models::Product,
            crate::models::ProductType,
            crate::models::ProductStatus,
            crate::models::Frequency,
            crate::models::PaymentMethod,
            crate::models::Purchase,
            crate::models::PurchaseStatus,
            crate::models::Subscription,
            crate::models::SubscriptionStatus,
            crate::purchases::PurchaseReceipt,
            crate::purchases::PurchasableItem,
            crate::purchases::PurchaseCheck,
            crate::purchases::PurchaseData,
            crate::analytics::AnalyticsReport,
            crate::analytics::Overview,
            crate::analytics::Breakdown,
            crate::analytics::DateRange
        )
    ),
    tags(
        (name = "projects", description = "Project lifecycle"),
        (name = "products", description = "Product directory"),
        (name = "purchases", description = "Purchase engine and purchase reads"),
        (name = "subscriptions", description = "Subscription status and cancellation"),
        (name = "analytics", description = "Revenue reporting")
    )
)]
pub struct ApiDoc;
