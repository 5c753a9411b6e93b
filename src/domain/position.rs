//! Fully-in / fully-out position state for one security over one day.

use super::error::TrendsimError;

/// Holding record. `NotYetTraded` carries the seeded capital, if any; once
/// the first trade happens the position is `Open` for the rest of the run,
/// with `shares == 0.0` meaning flat.
#[derive(Debug, Clone, PartialEq)]
pub enum Position {
    NotYetTraded {
        capital: Option<f64>,
    },
    Open {
        shares: f64,
        net_market_value: f64,
        last_price: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeState {
    Flat,
    Invested,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    Bought { shares: f64, price: f64 },
    Sold { proceeds: f64, price: f64 },
}

/// Edge-triggered trader: acts only when the incoming signal differs from
/// the signal it currently holds.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeStateMachine {
    pub ticker: String,
    pub position: Position,
    pub holding_signal: bool,
    pub trade_count: u32,
}

impl TradeStateMachine {
    pub fn new(ticker: impl Into<String>, starting_capital: Option<f64>) -> Self {
        TradeStateMachine {
            ticker: ticker.into(),
            position: Position::NotYetTraded {
                capital: starting_capital,
            },
            holding_signal: false,
            trade_count: 0,
        }
    }

    pub fn state(&self) -> TradeState {
        match self.position {
            Position::Open { shares, .. } if shares != 0.0 => TradeState::Invested,
            _ => TradeState::Flat,
        }
    }

    pub fn shares(&self) -> f64 {
        match self.position {
            Position::Open { shares, .. } => shares,
            Position::NotYetTraded { .. } => 0.0,
        }
    }

    /// Negative share count: the position can no longer be traded today.
    pub fn is_bust(&self) -> bool {
        self.shares() < 0.0
    }

    pub fn net_market_value(&self) -> Option<f64> {
        match self.position {
            Position::Open {
                net_market_value, ..
            } => Some(net_market_value),
            Position::NotYetTraded { capital } => capital,
        }
    }

    pub fn last_price(&self) -> Option<f64> {
        match self.position {
            Position::Open { last_price, .. } => Some(last_price),
            Position::NotYetTraded { .. } => None,
        }
    }

    /// Value of the holding at `price` without trading. Flat positions are
    /// worth their recorded net market value.
    pub fn mark_to_market(&self, price: f64) -> Option<f64> {
        match self.state() {
            TradeState::Invested => Some(self.shares() * price),
            TradeState::Flat => self.net_market_value(),
        }
    }

    /// Feeds one signal at `price`. Returns the transition if one happened.
    ///
    /// `initial_capital` is only consulted for a first buy without seeded
    /// capital.
    pub fn on_signal(
        &mut self,
        buy: bool,
        price: f64,
        initial_capital: Option<f64>,
    ) -> Result<Option<Transition>, TrendsimError> {
        if buy == self.holding_signal {
            return Ok(None);
        }

        let transition = if buy {
            self.buy(price, initial_capital)?
        } else {
            self.sell(price)
        };

        self.holding_signal = buy;
        self.trade_count += 1;
        Ok(Some(transition))
    }

    fn buy(&mut self, price: f64, initial_capital: Option<f64>) -> Result<Transition, TrendsimError> {
        let capital = match self.position {
            Position::NotYetTraded { capital } => {
                capital
                    .or(initial_capital)
                    .ok_or_else(|| TrendsimError::MissingCapital {
                        ticker: self.ticker.clone(),
                    })?
            }
            Position::Open {
                net_market_value, ..
            } => net_market_value,
        };

        let shares = capital / price;
        self.position = Position::Open {
            shares,
            net_market_value: capital,
            last_price: price,
        };
        Ok(Transition::Bought { shares, price })
    }

    fn sell(&mut self, price: f64) -> Transition {
        let (shares, held_value) = match self.position {
            Position::Open {
                shares,
                net_market_value,
                ..
            } => (shares, net_market_value),
            Position::NotYetTraded { capital } => (0.0, capital.unwrap_or(0.0)),
        };

        let proceeds = if shares == 0.0 { held_value } else { shares * price };
        self.position = Position::Open {
            shares: 0.0,
            net_market_value: proceeds,
            last_price: price,
        };
        Transition::Sold { proceeds, price }
    }
}
