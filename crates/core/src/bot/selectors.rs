//! Page selectors of the booking site.

// Login
pub const LOGIN_LINK: &str = "text=LOGIN";
pub const USER_ID: &str = "#userId";
pub const PASSWORD: &str = "#pwd";
pub const LOGIN_CAPTCHA: &str = "#captcha";
pub const SIGN_IN: &str = "#loginBtnId";
pub const OTP_MODAL: &str = "#otpModal";
pub const OTP_INPUT: &str = "#otpLoginId";
pub const OTP_CONTINUE: &str = "#continueBtn";
pub const LOGGED_IN: &str = "text=logout";

// Train search
pub const ORIGIN: &str = "#origin";
pub const DESTINATION: &str = "#destination";
pub const JOURNEY_DATE: &str = "#jDate";
pub const JOURNEY_CLASS: &str = "#journeyClass";
pub const JOURNEY_QUOTA: &str = "#journeyQuota";
pub const SEARCH: &str = "#searchBtn";
pub const TRAIN_LIST: &str = ".train-list";

// Train selection
pub const FIRST_BOOKABLE: &str = ".train-list .book-now-btn";

// Passenger details
pub const PASSENGER_FORM: &str = "#passenger-details";
pub const AUTO_UPGRADE: &str = "#autoUpgradation";
pub const TRAVEL_INSURANCE: &str = "#travelInsurance";
pub const BOOKING_CAPTCHA_IMAGE: &str = "#captcha-img";
pub const BOOKING_CAPTCHA_INPUT: &str = "#captcha-input";
pub const REVIEW_BOOKING: &str = "#reviewBooking";

// Payment
pub const PAYMENT_OPTIONS: &str = "#payment-options";
pub const UPI_OPTION: &str = "input[value='UP']";
pub const UPI_ID: &str = "#upiId";
pub const MAKE_PAYMENT: &str = "#makePayment";
pub const CONFIRMATION_URL: &str = "/booking/confirmation";

// Confirmation
pub const PNR_DETAILS: &str = "#pnr-details";
pub const PNR_NUMBER: &str = "#pnr-number";
pub const BOOKING_FAILED: &str = ".booking-failed";

pub fn passenger_name(index: usize) -> String {
    format!("#passengerName_{}", index)
}

pub fn passenger_age(index: usize) -> String {
    format!("#passengerAge_{}", index)
}

pub fn passenger_gender(index: usize) -> String {
    format!("#passengerGender_{}", index)
}

pub fn passenger_berth(index: usize) -> String {
    format!("#passengerBerth_{}", index)
}

pub fn calendar_day(day: u32) -> String {
    format!("text={}", day)
}

pub fn train(number: &str) -> String {
    format!("text={}", number)
}

pub fn upi_gateway(gateway: &str) -> String {
    format!("input[value='{}']", gateway)
}
