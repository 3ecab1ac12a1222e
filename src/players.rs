//! Parsing for the reply to `get playerinfo`, the command the probe runs by
//! default once it is authenticated.

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerInfo {
    pub name: String,
    pub team: String,
    pub role: String,
    pub kills: i32,
    pub deaths: i32,
    pub position: (f64, f64),
}

/// Parse one player per line: `name : team : role : kills : deaths : x : y`.
/// Lines with fewer fields are skipped. Counts are read from their leading
/// integer, so `12.0` is 12; anything unreadable defaults to zero.
pub fn parse_player_info(reply: &str) -> Vec<PlayerInfo> {
    reply.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<PlayerInfo> {
    let parts: Vec<&str> = line.split(':').map(str::trim).collect();
    if parts.len() < 7 {
        return None;
    }

    Some(PlayerInfo {
        name: String::from(parts[0]),
        team: parts[1].to_lowercase(),
        role: String::from(parts[2]),
        kills: leading_int(parts[3]),
        deaths: leading_int(parts[4]),
        position: (parts[5].parse().unwrap_or(0.0), parts[6].parse().unwrap_or(0.0)),
    })
}

fn leading_int(field: &str) -> i32 {
    let end = field
        .char_indices()
        .take_while(|&(i, c)| c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    field[..end].parse().unwrap_or(0)
}
