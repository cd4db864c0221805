use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Speaker {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub topic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub date: DateTime<Utc>,
    pub venue: String,
    pub description: Option<String>,
    pub speakers: Vec<Speaker>,
    pub tickets_available: i32,
    #[serde(rename = "imageURL")]
    pub image_url: String,
    pub organizer: Uuid,
    pub price: f64,
    pub attendees: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub name: String,
    pub date: DateTime<Utc>,
    pub venue: String,
    pub description: Option<String>,
    pub speakers: Vec<Speaker>,
    pub tickets_available: i32,
    pub image_url: String,
    pub organizer: Uuid,
    pub price: f64,
}

/// Краткие данные события для билетов пользователя.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub date: DateTime<Utc>,
    pub venue: String,
}

impl From<&Event> for EventSummary {
    fn from(event: &Event) -> Self {
        EventSummary {
            id: event.id,
            name: event.name.clone(),
            date: event.date,
            venue: event.venue.clone(),
        }
    }
}

/// Частичное обновление события.
///
/// Пустые строки и нули считаются "не передано" и оставляют старое значение,
/// поэтому очистить поле или обнулить количество билетов через update нельзя.
/// Список спикеров заменяется всегда, если он пришел (даже пустой).
/// Хранилище применяет обновление атомарно и не трогает незаданные поля.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EventUpdate {
    pub name: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub venue: Option<String>,
    pub description: Option<String>,
    pub speakers: Option<Vec<Speaker>>,
    #[validate(range(min = 0, message = "Tickets available cannot be negative"))]
    pub tickets_available: Option<i32>,
    #[serde(rename = "imageURL")]
    pub image_url: Option<String>,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: Option<f64>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl EventUpdate {
    /// Убирает "пустые" значения: после этого `Some` означает реальное изменение.
    pub fn normalized(self) -> Self {
        EventUpdate {
            name: non_empty(self.name),
            date: self.date,
            venue: non_empty(self.venue),
            description: non_empty(self.description),
            speakers: self.speakers,
            tickets_available: self.tickets_available.filter(|t| *t != 0),
            image_url: non_empty(self.image_url),
            price: self.price.filter(|p| *p != 0.0 && !p.is_nan()),
        }
    }

    pub fn apply(self, event: &mut Event) {
        let update = self.normalized();
        if let Some(name) = update.name {
            event.name = name;
        }
        if let Some(date) = update.date {
            event.date = date;
        }
        if let Some(venue) = update.venue {
            event.venue = venue;
        }
        if let Some(description) = update.description {
            event.description = Some(description);
        }
        if let Some(speakers) = update.speakers {
            event.speakers = speakers;
        }
        if let Some(tickets) = update.tickets_available {
            event.tickets_available = tickets;
        }
        if let Some(image_url) = update.image_url {
            event.image_url = image_url;
        }
        if let Some(price) = update.price {
            event.price = price;
        }
        event.updated_at = Utc::now();
    }
}
