//! Built-in wine catalog schema
//!
//! The stock field schema, metafield definitions and collection rules for
//! wine imports. Used when no schema file is configured; also the reference
//! layout the retailer CSVs are scraped into
//! (`Name,Brand,Country_State,Region,Appellation,Wine_Type,Varietal,...`).

use super::schema::{
    CollectionRule, FieldDecl, FieldKind, FieldSchema, MetafieldDefinition, RuleCondition,
    StandardField,
};

/// Field schema matching the wine catalog CSV layout.
pub fn wine_field_schema() -> FieldSchema {
    FieldSchema {
        product_type: "wine".to_string(),
        fields: vec![
            FieldDecl::standard(
                "identifier",
                &["SKU", "Sku", "Item_Number", "Source_URL", "URL"],
                true,
                StandardField::Identifier,
            ),
            FieldDecl::standard("title", &["Name", "Title", "Product_Name"], true, StandardField::Title),
            FieldDecl::standard("price", &["Price", "Current_Price"], true, StandardField::Price),
            FieldDecl::standard(
                "compare_at_price",
                &["Compare_At_Price", "Original_Price", "Was_Price"],
                false,
                StandardField::CompareAtPrice,
            ),
            FieldDecl::standard("vendor", &["Brand", "Winery", "Producer"], false, StandardField::Vendor),
            FieldDecl::standard(
                "description",
                &["Description", "Highlights", "Product_Description"],
                false,
                StandardField::Description,
            ),
            FieldDecl::standard("image", &["Image_URL", "Image"], false, StandardField::ImageUrl),
            FieldDecl::standard("tags", &["Tags"], false, StandardField::Tags),
            FieldDecl::standard(
                "category",
                &["Breadcrumbs", "Category", "Category_Path"],
                false,
                StandardField::CategoryPath,
            ),
            FieldDecl::metafield("varietal", &["Varietal", "Grape"], "wine", "varietal", FieldKind::Text)
                .with_tag(),
            FieldDecl::metafield("vintage", &["Vintage", "Year"], "wine", "vintage", FieldKind::Integer),
            FieldDecl::metafield("abv", &["ABV", "Alcohol"], "wine", "abv", FieldKind::Decimal),
            FieldDecl::metafield("appellation", &["Appellation"], "wine", "appellation", FieldKind::Text),
            FieldDecl::metafield("region", &["Region"], "wine", "region", FieldKind::Text).with_tag(),
            FieldDecl::metafield(
                "country_state",
                &["Country_State", "Country", "State"],
                "wine",
                "country_state",
                FieldKind::Text,
            )
            .with_tag(),
            FieldDecl::metafield("body", &["Body"], "wine", "body", FieldKind::Text).with_tag(),
            FieldDecl::metafield("style", &["Style"], "wine", "style", FieldKind::Text).with_tag(),
            FieldDecl::metafield(
                "tasting_notes",
                &["Taste_Notes", "Tasting_Notes"],
                "wine",
                "tasting_notes",
                FieldKind::Text,
            ),
            FieldDecl::metafield(
                "expert_rating",
                &["Expert_Rating", "Critic_Rating"],
                "wine",
                "expert_rating",
                FieldKind::Text,
            ),
            FieldDecl::metafield(
                "customer_rating",
                &["Customer_Rating", "Rating"],
                "wine",
                "customer_rating",
                FieldKind::Rating,
            ),
            FieldDecl::metafield(
                "customer_reviews_count",
                &["Customer_Reviews_Count", "Review_Count"],
                "wine",
                "customer_reviews_count",
                FieldKind::Integer,
            ),
            FieldDecl::metafield("mix_6_price", &["Mix_6_Price"], "wine", "mix_6_price", FieldKind::Text),
            FieldDecl::metafield("size", &["Size", "Bottle_Size"], "wine", "size", FieldKind::Text),
            FieldDecl::metafield("wine_type", &["Wine_Type", "Type"], "wine", "wine_type", FieldKind::Text)
                .with_tag(),
            FieldDecl::metafield("source_url", &["Source_URL", "URL"], "wine", "source_url", FieldKind::Text),
        ],
    }
}

/// The `wine.*` metafield definitions the store must carry.
pub fn wine_metafield_definitions() -> Vec<MetafieldDefinition> {
    vec![
        MetafieldDefinition::new(
            "wine",
            "varietal",
            "Varietal",
            "Primary grape variety (e.g., Cabernet Sauvignon, Chardonnay)",
            FieldKind::Text,
        ),
        MetafieldDefinition::new(
            "wine",
            "vintage",
            "Vintage",
            "Year the grapes were harvested",
            FieldKind::Integer,
        ),
        MetafieldDefinition::new(
            "wine",
            "abv",
            "Alcohol Content (ABV)",
            "Alcohol by volume percentage",
            FieldKind::Decimal,
        ),
        MetafieldDefinition::new(
            "wine",
            "appellation",
            "Appellation",
            "Specific wine region (e.g., Napa Valley, Bordeaux)",
            FieldKind::Text,
        ),
        MetafieldDefinition::new(
            "wine",
            "region",
            "Region",
            "Broader wine region (e.g., California, Tuscany)",
            FieldKind::Text,
        ),
        MetafieldDefinition::new(
            "wine",
            "country_state",
            "Country/State",
            "Country or state where wine is produced",
            FieldKind::Text,
        ),
        MetafieldDefinition::new("wine", "body", "Body", "Wine body: Light, Medium, or Full-bodied", FieldKind::Text),
        MetafieldDefinition::new("wine", "style", "Style", "Wine style: Elegant, Intense, etc.", FieldKind::Text),
        MetafieldDefinition::new(
            "wine",
            "tasting_notes",
            "Tasting Notes",
            "Flavor profile and tasting characteristics",
            FieldKind::Text,
        ),
        MetafieldDefinition::new(
            "wine",
            "expert_rating",
            "Expert Rating",
            "Professional wine ratings (e.g., '92 - Wine Spectator')",
            FieldKind::Text,
        ),
        MetafieldDefinition::new(
            "wine",
            "customer_rating",
            "Customer Rating",
            "Customer review rating on a 5-point scale",
            FieldKind::Rating,
        ),
        MetafieldDefinition::new(
            "wine",
            "customer_reviews_count",
            "Review Count",
            "Number of customer reviews",
            FieldKind::Integer,
        ),
        MetafieldDefinition::new(
            "wine",
            "mix_6_price",
            "Mix 6 Price",
            "Discounted price when buying 6+ bottles",
            FieldKind::Text,
        ),
        MetafieldDefinition::new("wine", "size", "Bottle Size", "Bottle size (e.g., 750ml, 1.5L)", FieldKind::Text),
        MetafieldDefinition::new(
            "wine",
            "wine_type",
            "Wine Type",
            "Type of wine: Red, White, Rosé, Sparkling",
            FieldKind::Text,
        ),
        MetafieldDefinition::new(
            "wine",
            "source_url",
            "Source URL",
            "Original product URL from wine retailer",
            FieldKind::Text,
        ),
    ]
}

/// Stock collection rules: wine types as manual collections, price bands as
/// automated rules on the variant price.
pub fn wine_collection_rules() -> Vec<CollectionRule> {
    vec![
        CollectionRule::manual("Red Wines", "red-wines"),
        CollectionRule::manual("White Wines", "white-wines"),
        CollectionRule::manual("Rosé Wines", "rose-wines"),
        CollectionRule::manual("Sparkling Wines", "sparkling-wines"),
        CollectionRule::manual("Dessert Wines", "dessert-wines"),
        CollectionRule::manual("Highly Rated Wines (90+ Points)", "highly-rated-wines"),
        CollectionRule::automated(
            "Wines Under $20",
            "wines-under-20",
            vec![RuleCondition::new("variant_price", "less_than", "20")],
        ),
        CollectionRule::automated(
            "$20 - $50 Wines",
            "wines-20-50",
            vec![
                RuleCondition::new("variant_price", "greater_than", "19.99"),
                RuleCondition::new("variant_price", "less_than", "50"),
            ],
        ),
        CollectionRule::automated(
            "Premium Wines $50+",
            "wines-over-50",
            vec![RuleCondition::new("variant_price", "greater_than", "49.99")],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::MetafieldRef;
    use std::collections::BTreeSet;

    #[test]
    fn every_schema_metafield_has_a_definition() {
        let declared: BTreeSet<MetafieldRef> =
            wine_field_schema().metafield_refs().into_iter().collect();
        let defined: BTreeSet<MetafieldRef> = wine_metafield_definitions()
            .iter()
            .map(MetafieldDefinition::reference)
            .collect();
        assert!(declared.is_subset(&defined), "schema references undefined metafields");
    }

    #[test]
    fn definition_kinds_match_schema_kinds() {
        let schema = wine_field_schema();
        let definitions = wine_metafield_definitions();
        for decl in &schema.fields {
            if let crate::domain::schema::FieldTarget::Metafield { namespace, key, kind } =
                &decl.target
            {
                let definition = definitions
                    .iter()
                    .find(|d| &d.namespace == namespace && &d.key == key)
                    .expect("definition exists");
                assert_eq!(&definition.kind, kind, "kind mismatch for {namespace}.{key}");
            }
        }
    }
}
