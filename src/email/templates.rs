//! HTML bodies for transactional email.

use rust_decimal::Decimal;

use super::Email;

pub struct OrderLine<'a> {
    pub title: &'a str,
    pub item_type: &'a str,
    pub unit_price: Decimal,
    pub quantity: i32,
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(site_name: &str, heading: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><body style=\"font-family:sans-serif\">\
         <h1>{heading}</h1>{body}<hr><p style=\"color:#888\">{site}</p></body></html>",
        heading = escape_html(heading),
        body = body,
        site = escape_html(site_name),
    )
}

pub fn welcome(site_name: &str, to: &str, name: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("Welcome to {}", site_name),
        html: layout(
            site_name,
            &format!("Welcome, {}!", name),
            "<p>Your account is ready. Browse the catalogue to find your next read.</p>",
        ),
    }
}

pub fn order_confirmation(
    site_name: &str,
    to: &str,
    order_number: &str,
    lines: &[OrderLine<'_>],
    total: Decimal,
    currency: &str,
) -> Email {
    let rows: String = lines
        .iter()
        .map(|line| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{} {}</td></tr>",
                escape_html(line.title),
                escape_html(line.item_type),
                line.quantity,
                line.unit_price,
                escape_html(currency)
            )
        })
        .collect();

    let body = format!(
        "<p>Thanks for your order <strong>{number}</strong>.</p>\
         <table><tr><th>Item</th><th>Type</th><th>Qty</th><th>Price</th></tr>{rows}</table>\
         <p><strong>Total: {total} {currency}</strong></p>",
        number = escape_html(order_number),
        rows = rows,
        total = total,
        currency = escape_html(currency),
    );

    Email {
        to: to.to_string(),
        subject: format!("Order {} confirmed", order_number),
        html: layout(site_name, "Order confirmed", &body),
    }
}

pub fn enrollment_confirmation(site_name: &str, to: &str, course_title: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("You're enrolled in {}", course_title),
        html: layout(
            site_name,
            "Enrollment confirmed",
            &format!("<p>You now have access to <strong>{}</strong>.</p>", escape_html(course_title)),
        ),
    }
}

pub fn event_registration(site_name: &str, to: &str, attendee_name: &str, event_title: &str, starts_at: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("Registered: {}", event_title),
        html: layout(
            site_name,
            "See you there",
            &format!(
                "<p>{}, your seat for <strong>{}</strong> is confirmed.</p><p>Starts: {}</p>",
                escape_html(attendee_name),
                escape_html(event_title),
                escape_html(starts_at)
            ),
        ),
    }
}
