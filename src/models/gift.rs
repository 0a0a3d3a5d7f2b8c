//! Gift records, categories and the seeded catalog.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of the seeded open-amount ("surprise") gift.
pub const OPEN_AMOUNT_GIFT_ID: i64 = 10;

/// Closed set of catalog categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Home,
    Kitchen,
    Honeymoon,
    Fun,
    Surprise,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Home,
        Category::Kitchen,
        Category::Honeymoon,
        Category::Fun,
        Category::Surprise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Home => "home",
            Category::Kitchen => "kitchen",
            Category::Honeymoon => "honeymoon",
            Category::Fun => "fun",
            Category::Surprise => "surprise",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "home" => Some(Category::Home),
            "kitchen" => Some(Category::Kitchen),
            "honeymoon" => Some(Category::Honeymoon),
            "fun" => Some(Category::Fun),
            "surprise" => Some(Category::Surprise),
            _ => None,
        }
    }

    /// Human-readable name shown in filters and listings.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Home => "Home",
            Category::Kitchen => "Kitchen",
            Category::Honeymoon => "Honeymoon",
            Category::Fun => "Fun",
            Category::Surprise => "Surprise",
        }
    }
}

/// One entry of the category filter.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryOption {
    pub value: Category,
    pub label: &'static str,
}

/// Every category in filter order.
pub fn category_options() -> Vec<CategoryOption> {
    Category::ALL
        .iter()
        .map(|&value| CategoryOption {
            value,
            label: value.label(),
        })
        .collect()
}

/// A catalog entry guests can reserve or contribute to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Gift {
    pub id: i64,
    pub name: String,
    /// Zero means the contributor chooses the amount
    pub price: f64,
    pub category: Category,
    pub icon: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reserved: bool,
    #[serde(default)]
    pub reserved_by: String,
    #[serde(default)]
    pub reserved_at: String,
    #[serde(default)]
    pub open_amount: bool,
}

impl Gift {
    /// Build a gift from an untyped storage record, coercing every field to its default.
    ///
    /// Returns `None` when the record has no integral numeric `id`; such records
    /// cannot be keyed and are dropped by the merge step.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let id = integral_id(obj.get("id")?)?;

        let text = |key: &str| -> String {
            obj.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let flag = |key: &str| obj.get(key).and_then(Value::as_bool).unwrap_or(false);

        let gift = Gift {
            id,
            name: text("name"),
            price: obj.get("price").and_then(Value::as_f64).unwrap_or(0.0),
            category: obj
                .get("category")
                .and_then(Value::as_str)
                .and_then(Category::from_str)
                .unwrap_or_default(),
            icon: text("icon"),
            description: text("description"),
            reserved: flag("reserved"),
            reserved_by: text("reservedBy"),
            reserved_at: text("reservedAt"),
            open_amount: flag("openAmount"),
        };
        Some(gift.normalized())
    }

    /// Coerce values a typed record can still get wrong.
    pub fn normalized(mut self) -> Self {
        if !self.price.is_finite() || self.price < 0.0 {
            self.price = 0.0;
        }
        self
    }

    /// Whether guests see this gift as already taken.
    ///
    /// Open-amount gifts are never taken, whatever their stored flag says.
    pub fn is_taken(&self) -> bool {
        !self.open_amount && self.reserved
    }

    /// A copy with every reservation field cleared.
    pub fn without_reservation(&self) -> Self {
        Gift {
            reserved: false,
            reserved_by: String::new(),
            reserved_at: String::new(),
            ..self.clone()
        }
    }
}

fn integral_id(value: &Value) -> Option<i64> {
    if let Some(id) = value.as_i64() {
        return Some(id);
    }
    let id = value.as_f64()?;
    (id.fract() == 0.0 && id.is_finite()).then_some(id as i64)
}

fn seed(id: i64, name: &str, price: f64, category: Category, icon: &str) -> Gift {
    Gift {
        id,
        name: name.to_string(),
        price,
        category,
        icon: icon.to_string(),
        description: String::new(),
        reserved: false,
        reserved_by: String::new(),
        reserved_at: String::new(),
        open_amount: false,
    }
}

/// The fixed catalog written the first time the store is empty.
pub fn initial_catalog() -> Vec<Gift> {
    vec![
        Gift {
            open_amount: true,
            ..seed(OPEN_AMOUNT_GIFT_ID, "Surprise PIX", 0.0, Category::Surprise, "🎁")
        },
        seed(1, "65-inch television", 4200.0, Category::Home, "📺"),
        seed(2, "Refrigerator", 3800.0, Category::Home, "🧊"),
        seed(3, "Washing machine", 2600.0, Category::Home, "🧺"),
        seed(4, "Cookware set", 850.0, Category::Kitchen, "🍳"),
        seed(5, "Blender", 320.0, Category::Kitchen, "🥤"),
        seed(6, "Air fryer", 650.0, Category::Kitchen, "🍟"),
        seed(7, "Romantic night", 300.0, Category::Honeymoon, "🌙"),
        seed(8, "Special tour", 500.0, Category::Honeymoon, "✈️"),
        seed(9, "Groom's manual", 99.0, Category::Fun, "📖"),
    ]
}

/// Format a price in Brazilian real, e.g. `R$ 4.200,00`. Zero means open amount.
pub fn format_price(price: f64) -> String {
    if price == 0.0 {
        return "Open amount".to_string();
    }

    let cents = (price.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if price < 0.0 { "-" } else { "" };
    format!("{}R$ {},{:02}", sign, grouped, cents % 100)
}
